//! menagerie CLI
//!
//! Command-line front end for the media catalog database.

mod commands;
mod error;
mod settings;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub(crate) use error::CliError;

#[derive(Parser)]
#[command(name = "menagerie")]
#[command(about = "Catalog, tag and deduplicate local media", long_about = None)]
struct Cli {
    /// Database file (defaults to the settings file, then the data directory)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the database location and schema version
    Status,

    /// Upgrade the database schema to the current version
    Migrate {
        /// Discard all data and rebuild an empty database
        #[arg(long)]
        reinitialize: bool,

        /// Confirm a destructive re-initialization
        #[arg(long)]
        confirm: bool,
    },

    /// Show catalog statistics
    Stats,

    /// Import files or directories (recursively)
    Import {
        /// Files or directories to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Put every imported file into a new group with this title
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Add tags to an item, creating tags as needed
    Tag {
        /// Item id
        item: i64,

        /// Tag names
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Remove tags from an item
    Untag {
        /// Item id
        item: i64,

        /// Tag names
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Mark two items as known non-duplicates
    NonDupe {
        /// First item id
        first: i64,

        /// Second item id
        second: i64,
    },

    /// Compact the database file
    Compress,
}

fn main() {
    init_logger();
    let cli = Cli::parse();

    let result = settings::load_settings().and_then(|settings| {
        let db_path = settings::resolve_database_path(cli.database, &settings);
        match cli.command {
            Commands::Status => commands::status::run_status(&db_path),
            Commands::Migrate {
                reinitialize,
                confirm,
            } => commands::migrate::run_migrate(&db_path, reinitialize, confirm),
            Commands::Stats => commands::stats::run_stats(&db_path, &settings),
            Commands::Import { paths, group } => {
                commands::import::run_import(&db_path, &settings, &paths, group.as_deref())
            }
            Commands::Tag { item, tags } => {
                commands::tag::run_tag(&db_path, &settings, item, &tags)
            }
            Commands::Untag { item, tags } => {
                commands::tag::run_untag(&db_path, &settings, item, &tags)
            }
            Commands::NonDupe { first, second } => {
                commands::non_dupe::run_non_dupe(&db_path, &settings, first, second)
            }
            Commands::Compress => commands::compress::run_compress(&db_path),
        }
    });

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

/// Plain-message logger on stdout; `RUST_LOG` overrides the `info` default.
fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| match record.level() {
            log::Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(buf, "[{level}] {}", record.args()),
        })
        .target(env_logger::Target::Stdout)
        .init();
}

/// Print an empty line through the logger.
pub(crate) fn log_blank() {
    log::info!("");
}
