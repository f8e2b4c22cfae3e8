use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use crate::CliError;

use super::open_database;

pub(crate) fn run_status(db_path: &Path) -> Result<(), CliError> {
    log::info!(
        "{}",
        "Menagerie Database".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("  Path: {}", db_path.display());

    if !db_path.exists() {
        log::info!("  No database yet. It is created on first import.");
        return Ok(());
    }

    let db = open_database(db_path)?;
    let version = db.version()?;
    let migrator = db.migrator();
    log::info!("  Schema version: v{version} (current v{})", migrator.required());

    if !migrator.needs_migration(version) {
        log::info!("  {}", "Up to date".if_supports_color(Stdout, |t| t.green()));
    } else if migrator.can_migrate(version) {
        log::info!(
            "  {} Run 'menagerie migrate' to upgrade.",
            "Needs migration.".if_supports_color(Stdout, |t| t.yellow()),
        );
    } else {
        log::warn!(
            "  v{version} is too old to upgrade (oldest supported: v{}).",
            migrator.minimum()
        );
        log::info!("  Run 'menagerie migrate --reinitialize --confirm' to start over.");
    }
    Ok(())
}
