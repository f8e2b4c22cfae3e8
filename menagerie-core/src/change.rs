//! Change records emitted by the menagerie and the listener registry that
//! delivers them.
//!
//! Every effective mutation produces exactly one [`Change`]. Listeners run
//! synchronously on the mutating thread, right after the mutation.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::histogram::Histogram;
use crate::ids::{ItemId, TagId};
use crate::item::Item;
use crate::similar::SimilarPair;
use crate::tag::Tag;

/// Old and new value of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta<T> {
    pub old: T,
    pub new: T,
}

impl<T> Delta<T> {
    pub fn new(old: T, new: T) -> Self {
        Self { old, new }
    }
}

/// A tag was put on or taken off an item.
#[derive(Debug, Clone, PartialEq)]
pub enum TagDelta {
    Added { item: ItemId, tag: TagId },
    Removed { item: ItemId, tag: TagId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileField {
    Md5(Delta<String>),
    Path(Delta<PathBuf>),
    ElementOf(Delta<Option<ItemId>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileDelta {
    pub item: ItemId,
    pub field: FileField,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageField {
    NoSimilar(Delta<bool>),
    Histogram(Delta<Option<Histogram>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageDelta {
    pub item: ItemId,
    pub field: ImageField,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupField {
    Title(Delta<String>),
    /// Full child list after the change.
    Items(Vec<ItemId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupDelta {
    pub item: ItemId,
    pub field: GroupField,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Snapshot of the item as registered.
    ItemAdded(Item),
    ItemRemoved(ItemId),
    Tags(TagDelta),
    File(FileDelta),
    Image(ImageDelta),
    Group(GroupDelta),
    TagAdded(Tag),
    TagRemoved(TagId),
    TagColor {
        tag: TagId,
        delta: Delta<Option<String>>,
    },
    NonDupeAdded(SimilarPair<ItemId>),
    NonDupeRemoved(SimilarPair<ItemId>),
    SimilarAdded(SimilarPair<ItemId>),
    SimilarRemoved(SimilarPair<ItemId>),
}

impl Change {
    /// The item this change is about, for per-item routing.
    pub fn item(&self) -> Option<ItemId> {
        match self {
            Self::ItemAdded(item) => Some(item.id()),
            Self::ItemRemoved(id) => Some(*id),
            Self::Tags(TagDelta::Added { item, .. } | TagDelta::Removed { item, .. }) => {
                Some(*item)
            }
            Self::File(d) => Some(d.item),
            Self::Image(d) => Some(d.item),
            Self::Group(d) => Some(d.item),
            _ => None,
        }
    }
}

/// Handle returned by subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&Change) + Send>;

/// Collection-wide and per-item subscribers.
#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    global: Vec<(SubscriptionId, Listener)>,
    per_item: HashMap<ItemId, Vec<(SubscriptionId, Listener)>>,
}

impl Listeners {
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = self.next_subscription();
        self.global.push((id, listener));
        id
    }

    pub fn subscribe_item(&mut self, item: ItemId, listener: Listener) -> SubscriptionId {
        let id = self.next_subscription();
        self.per_item.entry(item).or_default().push((id, listener));
        id
    }

    /// Returns true if a subscription was removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.len();
        self.global.retain(|(sid, _)| *sid != id);
        for subs in self.per_item.values_mut() {
            subs.retain(|(sid, _)| *sid != id);
        }
        self.per_item.retain(|_, subs| !subs.is_empty());
        self.len() != before
    }

    /// Drop every per-item subscription for `item`.
    pub fn forget_item(&mut self, item: ItemId) {
        self.per_item.remove(&item);
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.per_item.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a change to the item's subscribers, then to everyone else.
    pub fn emit(&mut self, change: &Change) {
        if let Some(subs) = change.item().and_then(|id| self.per_item.get_mut(&id)) {
            for (_, listener) in subs.iter_mut() {
                listener(change);
            }
        }
        for (_, listener) in self.global.iter_mut() {
            listener(change);
        }
    }

    fn next_subscription(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("global", &self.global.len())
            .field("per_item", &self.per_item.len())
            .finish()
    }
}
