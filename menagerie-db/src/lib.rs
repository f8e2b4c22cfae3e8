//! SQLite persistence for the media catalog.
//!
//! Schema migration, bulk load into a [`menagerie_core::Menagerie`], and a
//! background worker that applies queued updates as the model changes
//! (via rusqlite with the bundled feature).

pub mod bridge;
pub mod database;
pub mod error;
pub mod load;
pub mod migration;
mod migrations;
pub mod update;
pub mod worker;

pub use database::{GatewayConfig, MenagerieDatabase};
pub use error::DatabaseError;
pub use load::LoadReport;
pub use migration::{
    LEGACY, MINIMUM_VERSION, Migration, Migrator, REQUIRED_VERSION, UNINITIALIZED,
    retrieve_version,
};
pub use update::Update;
pub use worker::{ErrorHandler, UpdateQueue};
