//! Versioned schema migrations.
//!
//! A [`Migrator`] holds a registry of one-way transforms between schema
//! versions. Version `-1` is an uninitialized store, `0` is the legacy
//! pre-versioning layout. Each migration step runs inside its own
//! transaction together with the version marker it writes, so a failing
//! step leaves the store at the previous version.

use std::collections::HashSet;
use std::time::Instant;

use rusqlite::Connection;

use crate::error::DatabaseError;
use crate::migrations;

/// Version reported for a store without any recognizable schema.
pub const UNINITIALIZED: i32 = -1;

/// Version reported for the legacy layout that predates the version table.
pub const LEGACY: i32 = 0;

/// Oldest version the built-in chain can upgrade from.
pub const MINIMUM_VERSION: i32 = 8;

/// Version the rest of the crate reads and writes.
pub const REQUIRED_VERSION: i32 = 10;

/// A single schema transform.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub from: i32,
    pub to: i32,
    pub description: &'static str,
    pub run: fn(&Connection) -> rusqlite::Result<()>,
}

#[derive(Debug, Clone)]
pub struct Migrator {
    migrations: Vec<Migration>,
    minimum: i32,
    required: i32,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::standard()
    }
}

impl Migrator {
    /// An empty registry.
    pub fn new(minimum: i32, required: i32) -> Self {
        Self {
            migrations: Vec::new(),
            minimum,
            required,
        }
    }

    /// The built-in chain: initialize to v8, then v8 -> v9 -> v10.
    pub fn standard() -> Self {
        let mut migrator = Self::new(MINIMUM_VERSION, REQUIRED_VERSION);
        for migration in migrations::builtin() {
            migrator.register(migration);
        }
        migrator
    }

    pub fn register(&mut self, migration: Migration) {
        self.migrations.push(migration);
    }

    pub fn minimum(&self) -> i32 {
        self.minimum
    }

    pub fn required(&self) -> i32 {
        self.required
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn needs_migration(&self, version: i32) -> bool {
        version != self.required
    }

    /// Whether a chain of best migrations leads from `version` to the
    /// required version without gaps or cycles.
    ///
    /// Versions in `[0, minimum)` are never migratable; such a store has to
    /// be re-initialized instead.
    pub fn can_migrate(&self, version: i32) -> bool {
        if (LEGACY..self.minimum).contains(&version) {
            return false;
        }
        let mut seen = HashSet::new();
        let mut current = version;
        while current != self.required {
            if !seen.insert(current) {
                return false;
            }
            match self.best_for(current) {
                Some(m) => current = m.to,
                None => return false,
            }
        }
        true
    }

    /// The migration starting at `version` that gets closest to the
    /// required version without overshooting it.
    pub fn best_for(&self, version: i32) -> Option<&Migration> {
        self.migrations
            .iter()
            .filter(|m| m.from == version && m.to <= self.required)
            .max_by_key(|m| m.to)
    }

    /// Run migrations from `version` until the required version is
    /// reached. Returns the final version.
    pub fn migrate(&self, conn: &mut Connection, version: i32) -> Result<i32, DatabaseError> {
        if (LEGACY..self.minimum).contains(&version) {
            return Err(DatabaseError::BelowMinimumVersion {
                version,
                minimum: self.minimum,
            });
        }
        if !self.can_migrate(version) {
            return Err(DatabaseError::NoMigrationPath {
                from: version,
                to: self.required,
            });
        }

        let mut current = version;
        while self.needs_migration(current) {
            let migration = self
                .best_for(current)
                .ok_or(DatabaseError::NoMigrationPath {
                    from: current,
                    to: self.required,
                })?;
            self.run_step(conn, migration)?;
            current = migration.to;
        }
        Ok(current)
    }

    /// Wipe the store and rebuild it from scratch at the required version.
    pub fn reinitialize(&self, conn: &mut Connection) -> Result<i32, DatabaseError> {
        log::warn!("Re-initializing database; existing data will be discarded");
        self.migrate(conn, UNINITIALIZED)
    }

    fn run_step(&self, conn: &mut Connection, migration: &Migration) -> Result<(), DatabaseError> {
        log::info!(
            "Migrating database v{} -> v{}: {}",
            migration.from,
            migration.to,
            migration.description
        );
        let start = Instant::now();

        let tx = conn.transaction()?;
        (migration.run)(&tx)
            .map_err(|e| DatabaseError::migration(migration.from, migration.to, e))?;
        tx.execute("INSERT INTO version (version) VALUES (?1)", [migration.to])
            .map_err(|e| DatabaseError::migration(migration.from, migration.to, e))?;
        tx.commit()?;

        log::info!(
            "Migrated database to v{} in {:.2?}",
            migration.to,
            start.elapsed()
        );
        Ok(())
    }
}

/// Detect the schema version of an open store.
///
/// Reads the highest marker in the `version` table. Without one, a store
/// holding the legacy `imgs` table is version 0 and anything else is
/// uninitialized. An existing but empty `version` table counts as
/// uninitialized.
pub fn retrieve_version(conn: &Connection) -> Result<i32, DatabaseError> {
    if table_exists(conn, "version")? {
        let version: Option<i32> =
            conn.query_row("SELECT MAX(version) FROM version", [], |row| row.get(0))?;
        return Ok(version.unwrap_or(UNINITIALIZED));
    }
    if table_exists(conn, "imgs")? {
        return Ok(LEGACY);
    }
    Ok(UNINITIALIZED)
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
        [name],
        |row| row.get(0),
    )
}
