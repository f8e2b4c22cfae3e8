//! User settings and database path resolution.
//!
//! The settings file lives at `~/.config/menagerie/settings.toml`:
//!
//! ```toml
//! [database]
//! path = "/home/me/media/menagerie.db"
//!
//! [menagerie]
//! similarity_confidence = 0.95
//! default_tag = "tagme"
//! ```

use std::path::PathBuf;

use serde::Deserialize;

use menagerie_core::DEFAULT_TAG;

use crate::CliError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub database: DatabaseSettings,
    pub menagerie: MenagerieSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DatabaseSettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct MenagerieSettings {
    /// Histogram similarity at or above which two images are recorded as
    /// similar on import.
    pub similarity_confidence: f64,
    /// Tag put on newly imported items and groups.
    pub default_tag: String,
}

impl Default for MenagerieSettings {
    fn default() -> Self {
        Self {
            similarity_confidence: 0.95,
            default_tag: DEFAULT_TAG.to_string(),
        }
    }
}

/// Canonical path to the settings file: `~/.config/menagerie/settings.toml`.
pub(crate) fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("menagerie").join("settings.toml")
}

/// Default database location: `<data dir>/menagerie/menagerie.db`.
pub(crate) fn default_database_path() -> PathBuf {
    let data = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    data.join("menagerie").join("menagerie.db")
}

/// Load settings, falling back to defaults when the file does not exist.
pub(crate) fn load_settings() -> Result<Settings, CliError> {
    let path = settings_path();
    match std::fs::read_to_string(&path) {
        Ok(contents) => parse_settings(&contents)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn parse_settings(contents: &str) -> Result<Settings, CliError> {
    let settings: Settings = toml::from_str(contents).map_err(|e| CliError::config(e.to_string()))?;
    let confidence = settings.menagerie.similarity_confidence;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(CliError::config(format!(
            "similarity_confidence must be between 0 and 1, got {confidence}"
        )));
    }
    if settings.menagerie.default_tag.trim().is_empty() {
        return Err(CliError::config("default_tag must not be empty"));
    }
    Ok(settings)
}

/// Resolve the database path using a priority chain:
///
/// 1. CLI override (if `Some`)
/// 2. `database.path` in `settings.toml`
/// 3. [`default_database_path`]
pub(crate) fn resolve_database_path(cli_override: Option<PathBuf>, settings: &Settings) -> PathBuf {
    cli_override
        .or_else(|| settings.database.path.clone())
        .unwrap_or_else(default_database_path)
}
