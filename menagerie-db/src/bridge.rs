//! Translation of model change records into queued updates.

use menagerie_core::{
    Change, FileField, GroupField, ImageField, ItemKind, Menagerie, SubscriptionId, TagDelta,
};

use crate::update::Update;
use crate::worker::UpdateQueue;

/// The update that persists `change`, if it has one.
///
/// Group membership is stored on the group's ordered id list, so the
/// file-side `element_of` change has nothing to write.
pub fn update_for(change: &Change) -> Option<Update> {
    let update = match change {
        Change::ItemAdded(item) => match item.kind() {
            ItemKind::File(file) | ItemKind::Video(file) => Update::CreateFile {
                id: item.id(),
                added: item.added(),
                md5: file.md5().to_string(),
                path: file.path().to_path_buf(),
            },
            ItemKind::Image(file, image) => Update::CreateImage {
                id: item.id(),
                added: item.added(),
                md5: file.md5().to_string(),
                path: file.path().to_path_buf(),
                no_similar: image.no_similar(),
                histogram: image.histogram().cloned(),
            },
            ItemKind::Group(group) => Update::CreateGroup {
                id: item.id(),
                added: item.added(),
                title: group.title().to_string(),
                items: group.items().to_vec(),
            },
        },
        Change::ItemRemoved(id) => Update::DeleteItem { id: *id },
        Change::Tags(TagDelta::Added { item, tag }) => Update::TagItem {
            item: *item,
            tag: *tag,
        },
        Change::Tags(TagDelta::Removed { item, tag }) => Update::UntagItem {
            item: *item,
            tag: *tag,
        },
        Change::File(delta) => match &delta.field {
            FileField::Md5(d) => Update::SetFileMd5 {
                id: delta.item,
                md5: d.new.clone(),
            },
            FileField::Path(d) => Update::SetFilePath {
                id: delta.item,
                path: d.new.clone(),
            },
            FileField::ElementOf(_) => return None,
        },
        Change::Image(delta) => match &delta.field {
            ImageField::NoSimilar(d) => Update::SetImageNoSimilar {
                id: delta.item,
                no_similar: d.new,
            },
            ImageField::Histogram(d) => Update::SetImageHistogram {
                id: delta.item,
                histogram: d.new.clone(),
            },
        },
        Change::Group(delta) => match &delta.field {
            GroupField::Title(d) => Update::SetGroupTitle {
                id: delta.item,
                title: d.new.clone(),
            },
            GroupField::Items(items) => Update::SetGroupItems {
                id: delta.item,
                items: items.clone(),
            },
        },
        Change::TagAdded(tag) => Update::CreateTag {
            id: tag.id(),
            name: tag.name().to_string(),
            color: tag.color().map(str::to_string),
        },
        Change::TagRemoved(id) => Update::DeleteTag { id: *id },
        Change::TagColor { tag, delta } => Update::SetTagColor {
            id: *tag,
            color: delta.new.clone(),
        },
        Change::NonDupeAdded(pair) => Update::CreateNonDupe {
            first: *pair.first(),
            second: *pair.second(),
        },
        Change::NonDupeRemoved(pair) => Update::DeleteNonDupe {
            first: *pair.first(),
            second: *pair.second(),
        },
        Change::SimilarAdded(pair) => Update::CreateSimilar {
            first: *pair.first(),
            second: *pair.second(),
            similarity: pair.similarity(),
        },
        Change::SimilarRemoved(pair) => Update::DeleteSimilar {
            first: *pair.first(),
            second: *pair.second(),
        },
    };
    Some(update)
}

/// Subscribe a listener that enqueues the update for every change.
pub fn attach(menagerie: &mut Menagerie, queue: UpdateQueue) -> SubscriptionId {
    menagerie.subscribe(move |change| {
        if let Some(update) = update_for(change) {
            queue.enqueue(update);
        }
    })
}
