//! Items: a shared core (id, added time, tags) plus a variant payload.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::histogram::Histogram;
use crate::ids::{ItemId, TagId};

/// File extensions (lower-case) treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "jfif"];

/// File extensions (lower-case) treated as videos.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "webm", "mp4", "mov", "flv", "avi", "wmv", "3gp", "mpg", "m4v", "mkv",
];

/// Concrete item variant, used for classification and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    File,
    Image,
    Video,
    Group,
}

impl ItemType {
    /// Classify a path by its extension. Groups are never returned.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else {
            Self::File
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Image => "image",
            Self::Video => "video",
            Self::Group => "group",
        }
    }
}

/// Fields shared by every file-backed item.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub(crate) md5: String,
    pub(crate) path: PathBuf,
    pub(crate) element_of: Option<ItemId>,
}

impl FileInfo {
    pub fn md5(&self) -> &str {
        &self.md5
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The group this file belongs to, if any.
    pub fn element_of(&self) -> Option<ItemId> {
        self.element_of
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageInfo {
    pub(crate) no_similar: bool,
    pub(crate) histogram: Option<Histogram>,
}

impl ImageInfo {
    /// Excluded from duplicate search.
    pub fn no_similar(&self) -> bool {
        self.no_similar
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupInfo {
    pub(crate) title: String,
    pub(crate) items: Vec<ItemId>,
}

impl GroupInfo {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Children in display order.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    File(FileInfo),
    Image(FileInfo, ImageInfo),
    Video(FileInfo),
    Group(GroupInfo),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub(crate) id: ItemId,
    pub(crate) added: i64,
    pub(crate) tags: BTreeSet<TagId>,
    pub(crate) kind: ItemKind,
}

impl Item {
    /// A plain file item. `added` is in epoch milliseconds.
    pub fn file(id: ItemId, added: i64, md5: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_kind(id, added, ItemKind::File(file_info(md5, path)))
    }

    pub fn image(
        id: ItemId,
        added: i64,
        md5: impl Into<String>,
        path: impl Into<PathBuf>,
        no_similar: bool,
        histogram: Option<Histogram>,
    ) -> Self {
        Self::with_kind(
            id,
            added,
            ItemKind::Image(
                file_info(md5, path),
                ImageInfo {
                    no_similar,
                    histogram,
                },
            ),
        )
    }

    pub fn video(id: ItemId, added: i64, md5: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_kind(id, added, ItemKind::Video(file_info(md5, path)))
    }

    /// An empty group. Children are attached through the menagerie.
    pub fn group(id: ItemId, added: i64, title: impl Into<String>) -> Self {
        Self::with_kind(
            id,
            added,
            ItemKind::Group(GroupInfo {
                title: title.into(),
                items: Vec::new(),
            }),
        )
    }

    fn with_kind(id: ItemId, added: i64, kind: ItemKind) -> Self {
        Self {
            id,
            added,
            tags: BTreeSet::new(),
            kind,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn added(&self) -> i64 {
        self.added
    }

    pub fn tags(&self) -> &BTreeSet<TagId> {
        &self.tags
    }

    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tags.contains(&tag)
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn item_type(&self) -> ItemType {
        match self.kind {
            ItemKind::File(_) => ItemType::File,
            ItemKind::Image(..) => ItemType::Image,
            ItemKind::Video(_) => ItemType::Video,
            ItemKind::Group(_) => ItemType::Group,
        }
    }

    /// File payload for files, images and videos.
    pub fn file_info(&self) -> Option<&FileInfo> {
        match &self.kind {
            ItemKind::File(f) | ItemKind::Image(f, _) | ItemKind::Video(f) => Some(f),
            ItemKind::Group(_) => None,
        }
    }

    pub(crate) fn file_info_mut(&mut self) -> Option<&mut FileInfo> {
        match &mut self.kind {
            ItemKind::File(f) | ItemKind::Image(f, _) | ItemKind::Video(f) => Some(f),
            ItemKind::Group(_) => None,
        }
    }

    pub fn image_info(&self) -> Option<&ImageInfo> {
        match &self.kind {
            ItemKind::Image(_, img) => Some(img),
            _ => None,
        }
    }

    pub(crate) fn image_info_mut(&mut self) -> Option<&mut ImageInfo> {
        match &mut self.kind {
            ItemKind::Image(_, img) => Some(img),
            _ => None,
        }
    }

    pub fn group_info(&self) -> Option<&GroupInfo> {
        match &self.kind {
            ItemKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub(crate) fn group_info_mut(&mut self) -> Option<&mut GroupInfo> {
        match &mut self.kind {
            ItemKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.file_info().is_some()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ItemKind::Group(_))
    }

    /// Similarity in [0, 1]: same item or same file content is 1, images
    /// compare by histogram, anything else is 0.
    pub fn similarity_to(&self, other: &Item) -> f64 {
        if self.id == other.id {
            return 1.0;
        }
        let (Some(a), Some(b)) = (self.file_info(), other.file_info()) else {
            return 0.0;
        };
        if a.md5 == b.md5 || a.path == b.path {
            return 1.0;
        }
        match (
            self.image_info().and_then(|i| i.histogram.as_ref()),
            other.image_info().and_then(|i| i.histogram.as_ref()),
        ) {
            (Some(h1), Some(h2)) => h1.similarity_to(h2),
            _ => 0.0,
        }
    }
}

fn file_info(md5: impl Into<String>, path: impl Into<PathBuf>) -> FileInfo {
    FileInfo {
        md5: md5.into(),
        path: path.into(),
        element_of: None,
    }
}
