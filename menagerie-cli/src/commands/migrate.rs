use std::path::Path;
use std::time::Instant;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use crate::CliError;

use super::open_database;

/// Upgrade the schema, or rebuild it from scratch with `--reinitialize`.
pub(crate) fn run_migrate(db_path: &Path, reinitialize: bool, confirm: bool) -> Result<(), CliError> {
    if reinitialize && !confirm {
        log::warn!(
            "This will permanently delete every item and tag in:\n  {}",
            db_path.display(),
        );
        log::info!("Re-run with --confirm to proceed:");
        log::info!("  menagerie migrate --reinitialize --confirm");
        return Ok(());
    }

    let db = open_database(db_path)?;
    let version = db.version()?;
    let start = Instant::now();

    let reached = if reinitialize {
        db.reinitialize()?
    } else if !db.migrator().needs_migration(version) {
        log::info!("Database is already at v{version}.");
        return Ok(());
    } else if !db.migrator().can_migrate(version) {
        log::warn!("Database v{version} cannot be upgraded.");
        log::info!("Run 'menagerie migrate --reinitialize --confirm' to start over.");
        return Ok(());
    } else {
        db.migrate()?
    };

    log::info!(
        "{}",
        "Migration complete.".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("  v{version} -> v{reached} in {:.1?}", start.elapsed());
    Ok(())
}
