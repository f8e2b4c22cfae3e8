use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use menagerie_core::ItemType;

use crate::CliError;
use crate::settings::Settings;

use super::open_session;

pub(crate) fn run_stats(db_path: &Path, settings: &Settings) -> Result<(), CliError> {
    if !db_path.exists() {
        log::warn!("No database found at {}", db_path.display());
        log::info!("Run 'menagerie import <paths>' to create one.");
        return Ok(());
    }

    let session = open_session(db_path, settings)?;
    let m = &session.menagerie;

    let count = |kind: ItemType| m.items().filter(|i| i.item_type() == kind).count();
    let mut tags: Vec<_> = m.tags().collect();
    tags.sort_by(|a, b| b.frequency().cmp(&a.frequency()).then(a.name().cmp(b.name())));

    log::info!(
        "{}",
        "Catalog Statistics".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("  Database: {}", db_path.display());
    crate::log_blank();
    log::info!("  Items:          {:>8}", m.item_count());
    log::info!("    Files:        {:>8}", count(ItemType::File));
    log::info!("    Images:       {:>8}", count(ItemType::Image));
    log::info!("    Videos:       {:>8}", count(ItemType::Video));
    log::info!("    Groups:       {:>8}", count(ItemType::Group));
    log::info!("  Tags:           {:>8}", m.tag_count());
    log::info!("  Non-duplicates: {:>8}", m.non_dupes().count());
    log::info!("  Similar pairs:  {:>8}", m.similar_pairs().len());
    if session.report.orphans > 0 || session.report.skipped > 0 {
        log::info!(
            "  Ignored rows:   {:>8} ({} orphaned)",
            session.report.orphans + session.report.skipped,
            session.report.orphans,
        );
    }

    if !tags.is_empty() {
        crate::log_blank();
        log::info!("{}", "Top tags".if_supports_color(Stdout, |t| t.bold()));
        for tag in tags.iter().take(10) {
            log::info!("  {:<24} {:>6}", tag.name(), tag.frequency());
        }
    }

    session.finish()
}
