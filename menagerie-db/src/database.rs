//! The persistence gateway: open, migrate, load, then keep the store in
//! step with the model through the update worker.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use menagerie_core::{Menagerie, SubscriptionId};

use crate::bridge;
use crate::error::DatabaseError;
use crate::load::{self, LoadReport};
use crate::migration::{Migrator, retrieve_version};
use crate::update::Update;
use crate::worker::{ErrorHandlers, UpdateQueue, Worker};

/// Tunables for an open store.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long the idle worker waits on the queue before re-checking its
    /// running flag.
    pub poll_interval: Duration,
    /// Size of the prepared statement cache. Each update kind uses one or
    /// two statements.
    pub statement_cache_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            statement_cache_capacity: 32,
        }
    }
}

pub struct MenagerieDatabase {
    conn: Arc<Mutex<Connection>>,
    migrator: Migrator,
    config: GatewayConfig,
    handlers: ErrorHandlers,
    worker: Option<Worker>,
    bridge: Option<SubscriptionId>,
}

impl MenagerieDatabase {
    /// Open or create a store at `path`. The schema is not touched until
    /// [`migrate`](Self::migrate) runs.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Self::open_with(path, GatewayConfig::default())
    }

    pub fn open_with(path: &Path, config: GatewayConfig) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        log::debug!("Opened database {}", path.display());
        Ok(Self::from_connection(conn, config))
    }

    /// An uninitialized in-memory store. Useful for testing.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self::from_connection(conn, GatewayConfig::default()))
    }

    fn from_connection(conn: Connection, config: GatewayConfig) -> Self {
        conn.set_prepared_statement_cache_capacity(config.statement_cache_capacity);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            migrator: Migrator::standard(),
            config,
            handlers: ErrorHandlers::default(),
            worker: None,
            bridge: None,
        }
    }

    /// Replace the migration registry.
    pub fn with_migrator(mut self, migrator: Migrator) -> Self {
        self.migrator = migrator;
        self
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Exclusive access to the connection. Blocks while the worker is
    /// applying an update.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    // ── Schema ──────────────────────────────────────────────────────────────

    pub fn version(&self) -> Result<i32, DatabaseError> {
        retrieve_version(&*self.connection()?)
    }

    pub fn needs_migration(&self) -> Result<bool, DatabaseError> {
        Ok(self.migrator.needs_migration(self.version()?))
    }

    pub fn can_migrate(&self) -> Result<bool, DatabaseError> {
        Ok(self.migrator.can_migrate(self.version()?))
    }

    /// Bring the store to the required version, holding the connection
    /// lock throughout. Returns the final version.
    pub fn migrate(&self) -> Result<i32, DatabaseError> {
        self.require_idle()?;
        let mut conn = self.connection()?;
        let version = retrieve_version(&conn)?;
        self.migrator.migrate(&mut conn, version)
    }

    /// Discard everything and rebuild an empty store at the required
    /// version.
    pub fn reinitialize(&self) -> Result<i32, DatabaseError> {
        self.require_idle()?;
        let mut conn = self.connection()?;
        self.migrator.reinitialize(&mut conn)
    }

    /// Schema changes must not interleave with queued writes.
    fn require_idle(&self) -> Result<(), DatabaseError> {
        if self.is_updating() {
            return Err(DatabaseError::WorkerRunning);
        }
        Ok(())
    }

    // ── Load ────────────────────────────────────────────────────────────────

    /// Load the stored catalog, then start the worker and attach the change
    /// bridge so later mutations are persisted.
    pub fn load_menagerie(&mut self) -> Result<(Menagerie, LoadReport), DatabaseError> {
        self.load_menagerie_into(Menagerie::new())
    }

    /// Like [`load_menagerie`](Self::load_menagerie), with a caller-built
    /// (empty) menagerie, e.g. one with a custom default tag.
    pub fn load_menagerie_into(
        &mut self,
        mut menagerie: Menagerie,
    ) -> Result<(Menagerie, LoadReport), DatabaseError> {
        let found = self.version()?;
        if self.migrator.needs_migration(found) {
            return Err(DatabaseError::NeedsMigration {
                found,
                required: self.migrator.required(),
            });
        }

        let report = {
            let conn = self.connection()?;
            load::load_menagerie(&conn, &mut menagerie)?
        };
        self.attach(&mut menagerie)?;
        Ok((menagerie, report))
    }

    /// Start the worker if needed and route `menagerie`'s changes to it,
    /// replacing the route set up by an earlier load or attach. Use this
    /// after [`close`](Self::close) to resume persisting a loaded
    /// menagerie.
    pub fn attach(&mut self, menagerie: &mut Menagerie) -> Result<(), DatabaseError> {
        let queue = self.start_updater()?;
        if let Some(previous) = self.bridge.take() {
            menagerie.unsubscribe(previous);
        }
        self.bridge = Some(bridge::attach(menagerie, queue));
        Ok(())
    }

    // ── Worker ──────────────────────────────────────────────────────────────

    /// Start the update worker if it is not already running.
    ///
    /// A fresh worker has a fresh queue. A menagerie wired to a previous
    /// worker keeps sending to the old one until it is passed to
    /// [`attach`](Self::attach).
    pub fn start_updater(&mut self) -> Result<UpdateQueue, DatabaseError> {
        if let Some(worker) = &self.worker
            && worker.is_running()
        {
            return Ok(worker.queue());
        }
        let worker = Worker::spawn(
            self.conn.clone(),
            self.handlers.clone(),
            self.config.poll_interval,
        )?;
        let queue = worker.queue();
        self.worker = Some(worker);
        Ok(queue)
    }

    pub fn is_updating(&self) -> bool {
        self.worker.as_ref().is_some_and(Worker::is_running)
    }

    pub fn enqueue(&self, update: Update) -> Result<(), DatabaseError> {
        match &self.worker {
            Some(worker) if worker.queue().enqueue(update) => Ok(()),
            _ => Err(DatabaseError::WorkerStopped),
        }
    }

    /// Register a callback for updates that fail to apply.
    pub fn add_error_handler(
        &self,
        handler: impl Fn(&Update, &DatabaseError) + Send + Sync + 'static,
    ) {
        self.handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Block until the queue is drained.
    pub fn flush(&self) {
        if let Some(worker) = &self.worker {
            worker.flush();
        }
    }

    /// Stop the worker. Updates still queued are discarded; call
    /// [`flush`](Self::flush) first to keep them.
    pub fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.close();
        }
    }

    /// Flush, stop the worker and compact the store.
    pub fn close_and_compress(mut self) -> Result<(), DatabaseError> {
        self.flush();
        self.close();
        log::info!("Compacting database");
        self.connection()?.execute_batch("VACUUM;")?;
        Ok(())
    }
}

impl std::fmt::Debug for MenagerieDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenagerieDatabase")
            .field("migrator", &self.migrator)
            .field("config", &self.config)
            .field("worker_running", &self.is_updating())
            .finish()
    }
}
