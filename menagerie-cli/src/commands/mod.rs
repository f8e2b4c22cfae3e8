pub(crate) mod compress;
pub(crate) mod import;
pub(crate) mod migrate;
pub(crate) mod non_dupe;
pub(crate) mod stats;
pub(crate) mod status;
pub(crate) mod tag;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use menagerie_core::Menagerie;
use menagerie_db::{LoadReport, MenagerieDatabase};

use crate::CliError;
use crate::settings::Settings;

/// An opened, loaded catalog with the persistence worker running.
pub(crate) struct Session {
    pub db: MenagerieDatabase,
    pub menagerie: Menagerie,
    pub report: LoadReport,
    failures: Arc<AtomicUsize>,
}

impl Session {
    /// Wait for every pending write, then stop the worker. Fails if any
    /// write was rejected by the store.
    pub(crate) fn finish(mut self) -> Result<(), CliError> {
        self.db.flush();
        self.db.close();
        match self.failures.load(Ordering::Relaxed) {
            0 => Ok(()),
            n => Err(CliError::database(format!(
                "{n} change(s) could not be saved; see the log above"
            ))),
        }
    }
}

/// Open the database (creating its directory) without touching the schema.
pub(crate) fn open_database(db_path: &Path) -> Result<MenagerieDatabase, CliError> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    MenagerieDatabase::open(db_path).map_err(|e| {
        CliError::database(format!(
            "Failed to open database {}: {e}",
            db_path.display()
        ))
    })
}

/// Open and load the catalog. A fresh database is initialized on the spot;
/// an older schema has to be migrated explicitly first.
pub(crate) fn open_session(db_path: &Path, settings: &Settings) -> Result<Session, CliError> {
    let mut db = open_database(db_path)?;
    let version = db.version()?;
    if version == menagerie_db::UNINITIALIZED {
        log::info!("Initializing new database at {}", db_path.display());
        db.migrate()?;
    } else if db.needs_migration()? {
        return Err(CliError::database(format!(
            "Database is at v{version}, v{} is required. Run 'menagerie migrate' first.",
            db.migrator().required()
        )));
    }

    let failures = Arc::new(AtomicUsize::new(0));
    let counter = failures.clone();
    db.add_error_handler(move |_, _| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    let menagerie = Menagerie::new().with_default_tag(&settings.menagerie.default_tag);
    let (menagerie, report) = db.load_menagerie_into(menagerie)?;
    if report.orphans > 0 {
        log::warn!("{} orphaned item row(s) were ignored", report.orphans);
    }
    Ok(Session {
        db,
        menagerie,
        report,
        failures,
    })
}
