use std::path::PathBuf;

use thiserror::Error;

use crate::ids::{ItemId, TagId};

/// Errors raised by the in-memory domain model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An item with this id is already registered
    #[error("Item id {0} is already in use")]
    DuplicateItemId(ItemId),

    /// A tag with this id is already registered
    #[error("Tag id {0} is already in use")]
    DuplicateTagId(TagId),

    /// A tag with this (case-insensitive) name already exists
    #[error("Tag name '{0}' is already in use")]
    DuplicateTagName(String),

    /// Another live file item already points at this path
    #[error("File already present: {}", .0.display())]
    DuplicatePath(PathBuf),

    /// Paths are persisted as text
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("No item with id {0}")]
    UnknownItem(ItemId),

    #[error("No tag with id {0}")]
    UnknownTag(TagId),

    /// The operation needs an item of a different kind
    #[error("Item {id} is not {expected}")]
    WrongKind { id: ItemId, expected: &'static str },

    /// Groups may only hold file items
    #[error("Group {group} cannot contain group {child}")]
    GroupInGroup { group: ItemId, child: ItemId },

    /// Pair members must differ and the similarity must lie in [0, 1]
    #[error("Invalid pair: {0}")]
    InvalidPair(String),

    /// I/O error while reading an imported file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub fn wrong_kind(id: ItemId, expected: &'static str) -> Self {
        Self::WrongKind { id, expected }
    }

    pub fn invalid_pair(msg: impl Into<String>) -> Self {
        Self::InvalidPair(msg.into())
    }
}
