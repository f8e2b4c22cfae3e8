//! Domain model for the media catalog.
//!
//! Items (files, images, videos and groups), tags, duplicate bookkeeping and
//! the change records every mutation emits. Persistence lives in
//! `menagerie-db`; this crate knows nothing about storage.

pub mod change;
pub mod error;
pub mod histogram;
pub mod ids;
pub mod item;
pub mod menagerie;
pub mod similar;
pub mod tag;

pub use change::{
    Change, Delta, FileDelta, FileField, GroupDelta, GroupField, ImageDelta, ImageField,
    SubscriptionId, TagDelta,
};
pub use error::ModelError;
pub use histogram::{Histogram, HistogramError};
pub use ids::{IdCounter, ItemId, TagId};
pub use item::{FileInfo, GroupInfo, ImageInfo, Item, ItemKind, ItemType};
pub use menagerie::{DEFAULT_TAG, Menagerie};
pub use similar::SimilarPair;
pub use tag::Tag;
