use crate::ids::TagId;

/// A label that can be put on items.
///
/// Names are stored lower-case. `frequency` is maintained by the owning
/// [`Menagerie`](crate::Menagerie) as items are tagged and untagged.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub(crate) id: TagId,
    pub(crate) name: String,
    pub(crate) color: Option<String>,
    pub(crate) frequency: usize,
}

impl Tag {
    pub fn new(id: TagId, name: &str, color: Option<String>) -> Self {
        Self {
            id,
            name: normalize_name(name),
            color,
            frequency: 0,
        }
    }

    pub fn id(&self) -> TagId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Number of items currently holding this tag.
    pub fn frequency(&self) -> usize {
        self.frequency
    }
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
