//! Self-contained persistence commands.
//!
//! An [`Update`] carries resolved scalar values only, never references to
//! live model objects, so it stays valid no matter what happens to the
//! model after it was queued.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};

use menagerie_core::{Histogram, ItemId, ModelError, TagId};

use crate::error::DatabaseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    CreateItem {
        id: ItemId,
        added: i64,
    },
    /// Base item plus file row. Used for plain files and videos.
    CreateFile {
        id: ItemId,
        added: i64,
        md5: String,
        path: PathBuf,
    },
    /// Base item, file row and image row.
    CreateImage {
        id: ItemId,
        added: i64,
        md5: String,
        path: PathBuf,
        no_similar: bool,
        histogram: Option<Histogram>,
    },
    CreateGroup {
        id: ItemId,
        added: i64,
        title: String,
        items: Vec<ItemId>,
    },
    CreateTag {
        id: TagId,
        name: String,
        color: Option<String>,
    },
    DeleteItem {
        id: ItemId,
    },
    DeleteTag {
        id: TagId,
    },
    TagItem {
        item: ItemId,
        tag: TagId,
    },
    UntagItem {
        item: ItemId,
        tag: TagId,
    },
    SetFileMd5 {
        id: ItemId,
        md5: String,
    },
    SetFilePath {
        id: ItemId,
        path: PathBuf,
    },
    SetGroupTitle {
        id: ItemId,
        title: String,
    },
    SetGroupItems {
        id: ItemId,
        items: Vec<ItemId>,
    },
    CreateNonDupe {
        first: ItemId,
        second: ItemId,
    },
    DeleteNonDupe {
        first: ItemId,
        second: ItemId,
    },
    SetTagColor {
        id: TagId,
        color: Option<String>,
    },
    SetImageNoSimilar {
        id: ItemId,
        no_similar: bool,
    },
    SetImageHistogram {
        id: ItemId,
        histogram: Option<Histogram>,
    },
    CreateSimilar {
        first: ItemId,
        second: ItemId,
        similarity: f64,
    },
    DeleteSimilar {
        first: ItemId,
        second: ItemId,
    },
}

// ── Statements ──────────────────────────────────────────────────────────────

const INSERT_ITEM: &str = "INSERT INTO items (id, added) VALUES (?1, ?2)";
const INSERT_FILE: &str = "INSERT INTO files (id, md5, file) VALUES (?1, ?2, ?3)";
const INSERT_IMAGE: &str = "INSERT INTO images (id, no_similar, hist_a, hist_r, hist_g, hist_b)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const INSERT_GROUP: &str = "INSERT INTO groups (id, title, items) VALUES (?1, ?2, ?3)";
const INSERT_TAG: &str = "INSERT INTO tags (id, name, color) VALUES (?1, ?2, ?3)";
const DELETE_ITEM: &str = "DELETE FROM items WHERE id = ?1";
const DELETE_TAG: &str = "DELETE FROM tags WHERE id = ?1";
const INSERT_TAGGED: &str = "INSERT INTO tagged (item_id, tag_id) VALUES (?1, ?2)";
const DELETE_TAGGED: &str = "DELETE FROM tagged WHERE item_id = ?1 AND tag_id = ?2";
const UPDATE_MD5: &str = "UPDATE files SET md5 = ?1 WHERE id = ?2";
const UPDATE_PATH: &str = "UPDATE files SET file = ?1 WHERE id = ?2";
const UPDATE_TITLE: &str = "UPDATE groups SET title = ?1 WHERE id = ?2";
const UPDATE_GROUP_ITEMS: &str = "UPDATE groups SET items = ?1 WHERE id = ?2";
const INSERT_NON_DUPE: &str = "INSERT INTO non_dupes (item_1, item_2) VALUES (?1, ?2)";
const DELETE_NON_DUPE: &str = "DELETE FROM non_dupes
     WHERE (item_1 = ?1 AND item_2 = ?2) OR (item_1 = ?2 AND item_2 = ?1)";
const UPDATE_TAG_COLOR: &str = "UPDATE tags SET color = ?1 WHERE id = ?2";
const UPDATE_NO_SIMILAR: &str = "UPDATE images SET no_similar = ?1 WHERE id = ?2";
const UPDATE_HISTOGRAM: &str =
    "UPDATE images SET hist_a = ?1, hist_r = ?2, hist_g = ?3, hist_b = ?4 WHERE id = ?5";
const INSERT_SIMILAR: &str = "INSERT INTO similar (id1, id2, similarity) VALUES (?1, ?2, ?3)";
const DELETE_SIMILAR: &str = "DELETE FROM similar
     WHERE (id1 = ?1 AND id2 = ?2) OR (id1 = ?2 AND id2 = ?1)";

impl Update {
    /// Stable name of the update variant, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateItem { .. } => "CreateItem",
            Self::CreateFile { .. } => "CreateFile",
            Self::CreateImage { .. } => "CreateImage",
            Self::CreateGroup { .. } => "CreateGroup",
            Self::CreateTag { .. } => "CreateTag",
            Self::DeleteItem { .. } => "DeleteItem",
            Self::DeleteTag { .. } => "DeleteTag",
            Self::TagItem { .. } => "TagItem",
            Self::UntagItem { .. } => "UntagItem",
            Self::SetFileMd5 { .. } => "SetFileMd5",
            Self::SetFilePath { .. } => "SetFilePath",
            Self::SetGroupTitle { .. } => "SetGroupTitle",
            Self::SetGroupItems { .. } => "SetGroupItems",
            Self::CreateNonDupe { .. } => "CreateNonDupe",
            Self::DeleteNonDupe { .. } => "DeleteNonDupe",
            Self::SetTagColor { .. } => "SetTagColor",
            Self::SetImageNoSimilar { .. } => "SetImageNoSimilar",
            Self::SetImageHistogram { .. } => "SetImageHistogram",
            Self::CreateSimilar { .. } => "CreateSimilar",
            Self::DeleteSimilar { .. } => "DeleteSimilar",
        }
    }

    /// Execute against the store and return the number of affected rows.
    ///
    /// Statements come from the connection's prepared statement cache, so
    /// each kind of update is compiled once. Updates that touch several
    /// tables run inside a single transaction.
    pub fn apply(&self, conn: &Connection) -> Result<usize, DatabaseError> {
        let rows = match self {
            Self::CreateItem { id, added } => {
                conn.prepare_cached(INSERT_ITEM)?.execute(params![id.0, added])?
            }
            Self::CreateFile {
                id,
                added,
                md5,
                path,
            } => {
                let tx = conn.unchecked_transaction()?;
                let rows = insert_file(&tx, *id, *added, md5, path)?;
                tx.commit()?;
                rows
            }
            Self::CreateImage {
                id,
                added,
                md5,
                path,
                no_similar,
                histogram,
            } => {
                let tx = conn.unchecked_transaction()?;
                let [a, r, g, b] = channels(histogram.as_ref());
                let rows = insert_file(&tx, *id, *added, md5, path)?
                    + tx
                        .prepare_cached(INSERT_IMAGE)?
                        .execute(params![id.0, no_similar, a, r, g, b])?;
                tx.commit()?;
                rows
            }
            Self::CreateGroup {
                id,
                added,
                title,
                items,
            } => {
                let tx = conn.unchecked_transaction()?;
                let rows = tx.prepare_cached(INSERT_ITEM)?.execute(params![id.0, added])?
                    + tx
                        .prepare_cached(INSERT_GROUP)?
                        .execute(params![id.0, title, join_ids(items)])?;
                tx.commit()?;
                rows
            }
            Self::CreateTag { id, name, color } => {
                conn.prepare_cached(INSERT_TAG)?.execute(params![id.0, name, color])?
            }
            Self::DeleteItem { id } => conn.prepare_cached(DELETE_ITEM)?.execute([id.0])?,
            Self::DeleteTag { id } => conn.prepare_cached(DELETE_TAG)?.execute([id.0])?,
            Self::TagItem { item, tag } => {
                conn.prepare_cached(INSERT_TAGGED)?.execute([item.0, tag.0])?
            }
            Self::UntagItem { item, tag } => {
                conn.prepare_cached(DELETE_TAGGED)?.execute([item.0, tag.0])?
            }
            Self::SetFileMd5 { id, md5 } => {
                conn.prepare_cached(UPDATE_MD5)?.execute(params![md5, id.0])?
            }
            Self::SetFilePath { id, path } => conn
                .prepare_cached(UPDATE_PATH)?
                .execute(params![path_text(path)?, id.0])?,
            Self::SetGroupTitle { id, title } => {
                conn.prepare_cached(UPDATE_TITLE)?.execute(params![title, id.0])?
            }
            Self::SetGroupItems { id, items } => conn
                .prepare_cached(UPDATE_GROUP_ITEMS)?
                .execute(params![join_ids(items), id.0])?,
            Self::CreateNonDupe { first, second } => {
                conn.prepare_cached(INSERT_NON_DUPE)?.execute([first.0, second.0])?
            }
            Self::DeleteNonDupe { first, second } => {
                conn.prepare_cached(DELETE_NON_DUPE)?.execute([first.0, second.0])?
            }
            Self::SetTagColor { id, color } => {
                conn.prepare_cached(UPDATE_TAG_COLOR)?.execute(params![color, id.0])?
            }
            Self::SetImageNoSimilar { id, no_similar } => conn
                .prepare_cached(UPDATE_NO_SIMILAR)?
                .execute(params![no_similar, id.0])?,
            Self::SetImageHistogram { id, histogram } => {
                let [a, r, g, b] = channels(histogram.as_ref());
                conn.prepare_cached(UPDATE_HISTOGRAM)?
                    .execute(params![a, r, g, b, id.0])?
            }
            Self::CreateSimilar {
                first,
                second,
                similarity,
            } => conn
                .prepare_cached(INSERT_SIMILAR)?
                .execute(params![first.0, second.0, similarity])?,
            Self::DeleteSimilar { first, second } => {
                conn.prepare_cached(DELETE_SIMILAR)?.execute([first.0, second.0])?
            }
        };
        Ok(rows)
    }
}

fn insert_file(
    conn: &Connection,
    id: ItemId,
    added: i64,
    md5: &str,
    path: &Path,
) -> Result<usize, DatabaseError> {
    let path = path_text(path)?;
    Ok(conn.prepare_cached(INSERT_ITEM)?.execute(params![id.0, added])?
        + conn
            .prepare_cached(INSERT_FILE)?
            .execute(params![id.0, md5, path])?)
}

/// Paths are stored as text; one that is not UTF-8 would not load back
/// unchanged.
fn path_text(path: &Path) -> Result<&str, DatabaseError> {
    path.to_str()
        .ok_or_else(|| ModelError::NonUtf8Path(path.to_path_buf()).into())
}

fn channels(histogram: Option<&Histogram>) -> [Option<Vec<u8>>; 4] {
    match histogram {
        Some(h) => h.encode().map(Some),
        None => [None, None, None, None],
    }
}

/// Comma-separated child ids, in order.
pub(crate) fn join_ids(ids: &[ItemId]) -> String {
    ids.iter()
        .map(|id| id.0.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`join_ids`]. Unparseable entries are reported as `Err`.
pub(crate) fn split_ids(csv: &str) -> impl Iterator<Item = Result<ItemId, &str>> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map(ItemId).map_err(|_| s))
}
