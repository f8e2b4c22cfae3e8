use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use crate::CliError;

use super::open_database;

pub(crate) fn run_compress(db_path: &Path) -> Result<(), CliError> {
    if !db_path.exists() {
        log::info!("No database found at {}", db_path.display());
        return Ok(());
    }

    let before = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    open_database(db_path)?.close_and_compress()?;
    let after = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    let to_mb = |bytes: u64| bytes as f64 / (1024.0 * 1024.0);
    log::info!(
        "{}",
        "Database compacted.".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("  Path: {}", db_path.display());
    log::info!("  Size: {:.1} MB -> {:.1} MB", to_mb(before), to_mb(after));
    Ok(())
}
