use menagerie_core::{HistogramError, ModelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration from v{from} to v{to} failed: {source}")]
    Migration {
        from: i32,
        to: i32,
        source: rusqlite::Error,
    },

    #[error("Database version {version} is older than the oldest supported version {minimum}")]
    BelowMinimumVersion { version: i32, minimum: i32 },

    #[error("No migration path from v{from} to v{to}")]
    NoMigrationPath { from: i32, to: i32 },

    #[error("Database is at v{found} but v{required} is required; migrate first")]
    NeedsMigration { found: i32, required: i32 },

    #[error("Histogram error: {0}")]
    Histogram(#[from] HistogramError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Failed to start persistence worker: {0}")]
    WorkerSpawn(std::io::Error),

    #[error("Persistence worker is running; close it before changing the schema")]
    WorkerRunning,

    #[error("Persistence worker is not running")]
    WorkerStopped,

    #[error("Database connection lock poisoned")]
    Poisoned,
}

impl DatabaseError {
    pub fn migration(from: i32, to: i32, source: rusqlite::Error) -> Self {
        Self::Migration { from, to, source }
    }
}
