use std::path::Path;

use menagerie_core::{ItemId, SimilarPair};

use crate::CliError;
use crate::settings::Settings;

use super::open_session;

/// Record that two items are not duplicates and drop any similar pair
/// between them.
pub(crate) fn run_non_dupe(
    db_path: &Path,
    settings: &Settings,
    first: i64,
    second: i64,
) -> Result<(), CliError> {
    let pair = SimilarPair::new(ItemId(first), ItemId(second), 1.0)?;
    let mut session = open_session(db_path, settings)?;
    let m = &mut session.menagerie;

    for id in [pair.first(), pair.second()] {
        if !m.has_item(*id) {
            return Err(CliError::not_found(format!("item {id}")));
        }
    }

    if m.add_non_dupe(pair)? {
        let purged = m.purge_similar_non_dupes();
        log::info!("Marked {first} and {second} as non-duplicates");
        if purged > 0 {
            log::info!("  Dropped {purged} similar pair(s)");
        }
    } else {
        log::info!("{first} and {second} are already marked as non-duplicates");
    }
    session.finish()
}
