use thiserror::Error;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Catalog mutation rejected by the model
    #[error("Catalog error: {0}")]
    Model(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Referenced item or tag does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl CliError {
    pub(crate) fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub(crate) fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<menagerie_db::DatabaseError> for CliError {
    fn from(e: menagerie_db::DatabaseError) -> Self {
        Self::database(e.to_string())
    }
}

impl From<menagerie_core::ModelError> for CliError {
    fn from(e: menagerie_core::ModelError) -> Self {
        Self::model(e.to_string())
    }
}
