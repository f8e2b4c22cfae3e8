//! Bulk load of a stored catalog into a fresh [`Menagerie`].
//!
//! Runs before the change bridge is attached, so nothing loaded here is
//! queued for writing back.

use std::collections::HashSet;
use std::path::PathBuf;

use rusqlite::Connection;

use menagerie_core::{
    Histogram, Item, ItemId, ItemType, Menagerie, ModelError, SimilarPair, Tag, TagId,
};

use crate::error::DatabaseError;
use crate::update::split_ids;

/// What a load found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub tags: usize,
    pub items: usize,
    /// Base item rows without a file or group row. Not loaded.
    pub orphans: usize,
    /// Associations (group children, tags, pairs) that referenced
    /// something missing or invalid.
    pub skipped: usize,
}

/// Populate `menagerie` from `conn` and seed its id counters.
pub fn load_menagerie(conn: &Connection, menagerie: &mut Menagerie) -> Result<LoadReport, DatabaseError> {
    let mut report = LoadReport::default();

    load_tags(conn, menagerie, &mut report)?;
    load_files(conn, menagerie, &mut report)?;
    let groups = load_groups(conn, menagerie, &mut report)?;
    count_orphans(conn, &mut report)?;
    wire_groups(menagerie, groups, &mut report)?;
    load_tagged(conn, menagerie, &mut report)?;
    load_non_dupes(conn, menagerie, &mut report)?;
    load_similar(conn, menagerie, &mut report)?;

    menagerie.seed_counters();
    let (max_item, max_tag): (Option<i64>, Option<i64>) = conn.query_row(
        "SELECT (SELECT MAX(id) FROM items), (SELECT MAX(id) FROM tags)",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    menagerie.observe_ids(max_item.map(ItemId), max_tag.map(TagId));

    log::info!(
        "Loaded {} item(s) and {} tag(s) ({} orphan(s) dropped, {} reference(s) skipped)",
        report.items,
        report.tags,
        report.orphans,
        report.skipped
    );
    Ok(report)
}

// ── Tags ────────────────────────────────────────────────────────────────────

fn load_tags(
    conn: &Connection,
    menagerie: &mut Menagerie,
    report: &mut LoadReport,
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name, color FROM tags ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (id, name, color) in rows {
        match menagerie.add_tag(Tag::new(TagId(id), &name, color)) {
            Ok(()) => report.tags += 1,
            Err(e @ (ModelError::DuplicateTagName(_) | ModelError::DuplicateTagId(_))) => {
                log::warn!("Skipping tag {id}: {e}");
                report.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

// ── Items ───────────────────────────────────────────────────────────────────

struct FileRow {
    id: i64,
    added: i64,
    md5: Option<String>,
    path: Option<String>,
    image: Option<ImageRow>,
}

struct ImageRow {
    no_similar: bool,
    channels: [Option<Vec<u8>>; 4],
}

fn load_files(
    conn: &Connection,
    menagerie: &mut Menagerie,
    report: &mut LoadReport,
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT items.id, items.added, files.md5, files.file,
                images.id, images.no_similar,
                images.hist_a, images.hist_r, images.hist_g, images.hist_b
         FROM files
         JOIN items ON items.id = files.id
         LEFT JOIN images ON images.id = files.id
         ORDER BY items.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let image = match row.get::<_, Option<i64>>(4)? {
                Some(_) => Some(ImageRow {
                    no_similar: row.get(5)?,
                    channels: [row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?],
                }),
                None => None,
            };
            Ok(FileRow {
                id: row.get(0)?,
                added: row.get(1)?,
                md5: row.get(2)?,
                path: row.get(3)?,
                image,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for row in rows {
        let id = ItemId(row.id);
        let Some(path) = row.path.map(PathBuf::from) else {
            log::warn!("Dropping file item {id}: no path stored");
            report.orphans += 1;
            continue;
        };
        let md5 = row.md5.unwrap_or_default();

        let item = match row.image {
            Some(image) => {
                let histogram = decode_histogram(id, &image.channels);
                Item::image(id, row.added, md5, path, image.no_similar, histogram)
            }
            None if ItemType::from_path(&path) == ItemType::Video => {
                Item::video(id, row.added, md5, path)
            }
            None => Item::file(id, row.added, md5, path),
        };
        menagerie.add_item(item)?;
        report.items += 1;
    }
    Ok(())
}

fn decode_histogram(id: ItemId, channels: &[Option<Vec<u8>>; 4]) -> Option<Histogram> {
    let [Some(a), Some(r), Some(g), Some(b)] = channels else {
        return None;
    };
    match Histogram::decode(a, r, g, b) {
        Ok(h) => Some(h),
        Err(e) => {
            log::warn!("Ignoring stored histogram of item {id}: {e}");
            None
        }
    }
}

fn load_groups(
    conn: &Connection,
    menagerie: &mut Menagerie,
    report: &mut LoadReport,
) -> Result<Vec<(ItemId, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT items.id, items.added, groups.title, groups.items
         FROM groups
         JOIN items ON items.id = groups.id
         ORDER BY items.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut children = Vec::new();
    for (id, added, title, items) in rows {
        let id = ItemId(id);
        menagerie.add_item(Item::group(id, added, title.unwrap_or_default()))?;
        report.items += 1;
        if let Some(items) = items {
            children.push((id, items));
        }
    }
    Ok(children)
}

fn count_orphans(conn: &Connection, report: &mut LoadReport) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM items
         WHERE id NOT IN (SELECT id FROM files)
           AND id NOT IN (SELECT id FROM groups)
         ORDER BY id",
    )?;
    let orphans = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for id in orphans {
        log::warn!("Dropping orphaned item {id}: no file or group row");
        report.orphans += 1;
    }
    Ok(())
}

fn wire_groups(
    menagerie: &mut Menagerie,
    groups: Vec<(ItemId, String)>,
    report: &mut LoadReport,
) -> Result<(), DatabaseError> {
    let mut claimed = HashSet::new();
    for (group, csv) in groups {
        for child in split_ids(&csv) {
            let child = match child {
                Ok(id) => id,
                Err(raw) => {
                    log::warn!("Group {group} lists malformed child id {raw:?}");
                    report.skipped += 1;
                    continue;
                }
            };
            let is_file = menagerie.get_item(child).is_some_and(Item::is_file);
            if !is_file || !claimed.insert(child) {
                log::warn!("Group {group} lists unusable child {child}");
                report.skipped += 1;
                continue;
            }
            menagerie.add_to_group(group, child, None)?;
        }
    }
    Ok(())
}

// ── Associations ────────────────────────────────────────────────────────────

fn id_pairs(conn: &Connection, sql: &str) -> Result<Vec<(i64, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_tagged(
    conn: &Connection,
    menagerie: &mut Menagerie,
    report: &mut LoadReport,
) -> Result<(), DatabaseError> {
    for (item, tag) in id_pairs(conn, "SELECT item_id, tag_id FROM tagged")? {
        let (item, tag) = (ItemId(item), TagId(tag));
        if !menagerie.has_item(item) || !menagerie.has_tag(tag) {
            log::debug!("Skipping tag {tag} on missing item {item}");
            report.skipped += 1;
            continue;
        }
        menagerie.tag_item(item, tag)?;
    }
    Ok(())
}

fn load_non_dupes(
    conn: &Connection,
    menagerie: &mut Menagerie,
    report: &mut LoadReport,
) -> Result<(), DatabaseError> {
    for (a, b) in id_pairs(conn, "SELECT item_1, item_2 FROM non_dupes")? {
        let (a, b) = (ItemId(a), ItemId(b));
        let pair = match SimilarPair::new(a, b, 1.0) {
            Ok(pair) if menagerie.has_item(a) && menagerie.has_item(b) => pair,
            _ => {
                log::debug!("Skipping non-dupe pair ({a}, {b})");
                report.skipped += 1;
                continue;
            }
        };
        menagerie.add_non_dupe(pair)?;
    }
    Ok(())
}

fn load_similar(
    conn: &Connection,
    menagerie: &mut Menagerie,
    report: &mut LoadReport,
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare("SELECT id1, id2, similarity FROM similar")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (a, b, similarity) in rows {
        let (a, b) = (ItemId(a), ItemId(b));
        let added = match SimilarPair::new(a, b, similarity) {
            Ok(pair) if menagerie.has_item(a) && menagerie.has_item(b) => {
                menagerie.add_similarity(pair)?
            }
            _ => false,
        };
        if !added {
            log::debug!("Skipping similar pair ({a}, {b})");
            report.skipped += 1;
        }
    }
    Ok(())
}
