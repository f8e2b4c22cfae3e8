use std::path::Path;

use menagerie_core::ItemId;

use crate::CliError;
use crate::settings::Settings;

use super::{Session, open_session};

fn open_for_item(db_path: &Path, settings: &Settings, item: i64) -> Result<(Session, ItemId), CliError> {
    let session = open_session(db_path, settings)?;
    let id = ItemId(item);
    if !session.menagerie.has_item(id) {
        return Err(CliError::not_found(format!("item {id}")));
    }
    Ok((session, id))
}

/// Tag an item, creating any tag that does not exist yet.
pub(crate) fn run_tag(
    db_path: &Path,
    settings: &Settings,
    item: i64,
    tags: &[String],
) -> Result<(), CliError> {
    let (mut session, id) = open_for_item(db_path, settings, item)?;
    let m = &mut session.menagerie;
    for name in tags {
        let tag = m.get_or_make_tag(name)?;
        if m.tag_item(id, tag)? {
            log::info!("Tagged {id} with '{}'", name.trim().to_lowercase());
        } else {
            log::info!("{id} already has '{}'", name.trim().to_lowercase());
        }
    }
    session.finish()
}

pub(crate) fn run_untag(
    db_path: &Path,
    settings: &Settings,
    item: i64,
    tags: &[String],
) -> Result<(), CliError> {
    let (mut session, id) = open_for_item(db_path, settings, item)?;
    let m = &mut session.menagerie;
    for name in tags {
        let Some(tag) = m.get_tag_by_name(name).map(|t| t.id()) else {
            log::warn!("No tag named '{name}'");
            continue;
        };
        if m.untag_item(id, tag)? {
            log::info!("Removed '{name}' from {id}");
        }
    }
    session.finish()
}
