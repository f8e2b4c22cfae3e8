//! The aggregate root owning items, tags and duplicate bookkeeping.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::change::{
    Change, Delta, FileDelta, FileField, GroupDelta, GroupField, ImageDelta, ImageField,
    Listener, Listeners, SubscriptionId, TagDelta,
};
use crate::error::ModelError;
use crate::histogram::Histogram;
use crate::ids::{IdCounter, ItemId, TagId};
use crate::item::{Item, ItemType};
use crate::similar::SimilarPair;
use crate::tag::{Tag, normalize_name};

/// Tag put on freshly imported items and groups.
pub const DEFAULT_TAG: &str = "tagme";

/// Histogram similarity above which two images are considered related.
pub const NO_SIMILAR_MAX: f64 = 0.9;

/// The in-memory catalog.
///
/// All mutation goes through methods on this type. Each effective mutation
/// emits one [`Change`] to subscribed listeners; no-op mutations return
/// `false` and emit nothing. There is no internal locking: callers mutate
/// from a single logical context.
#[derive(Debug)]
pub struct Menagerie {
    items: BTreeMap<ItemId, Item>,
    files: HashMap<PathBuf, ItemId>,
    tags: BTreeMap<TagId, Tag>,
    tag_names: HashMap<String, TagId>,
    non_dupes: HashSet<SimilarPair<ItemId>>,
    similar: Vec<SimilarPair<ItemId>>,
    item_ids: IdCounter,
    tag_ids: IdCounter,
    listeners: Listeners,
    default_tag: String,
}

impl Default for Menagerie {
    fn default() -> Self {
        Self::new()
    }
}

impl Menagerie {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            files: HashMap::new(),
            tags: BTreeMap::new(),
            tag_names: HashMap::new(),
            non_dupes: HashSet::new(),
            similar: Vec::new(),
            item_ids: IdCounter::default(),
            tag_ids: IdCounter::default(),
            listeners: Listeners::default(),
            default_tag: DEFAULT_TAG.to_string(),
        }
    }

    /// Use a different tag for new imports and groups.
    pub fn with_default_tag(mut self, name: &str) -> Self {
        self.default_tag = normalize_name(name);
        self
    }

    // ── Ids ─────────────────────────────────────────────────────────────────

    pub fn reserve_item_id(&mut self) -> ItemId {
        ItemId(self.item_ids.reserve())
    }

    pub fn reserve_tag_id(&mut self) -> TagId {
        TagId(self.tag_ids.reserve())
    }

    /// Next item id that would be reserved.
    pub fn next_item_id(&self) -> ItemId {
        ItemId(self.item_ids.peek())
    }

    pub fn next_tag_id(&self) -> TagId {
        TagId(self.tag_ids.peek())
    }

    /// Move both counters past every registered id.
    pub fn seed_counters(&mut self) {
        if let Some(max) = self.items.keys().next_back() {
            self.item_ids.observe(max.0);
        }
        if let Some(max) = self.tags.keys().next_back() {
            self.tag_ids.observe(max.0);
        }
    }

    /// Move the counters past ids that are in use elsewhere, such as rows
    /// in storage that were not loaded.
    pub fn observe_ids(&mut self, item: Option<ItemId>, tag: Option<TagId>) {
        if let Some(item) = item {
            self.item_ids.observe(item.0);
        }
        if let Some(tag) = tag {
            self.tag_ids.observe(tag.0);
        }
    }

    // ── Subscriptions ───────────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: impl FnMut(&Change) + Send + 'static) -> SubscriptionId {
        self.listeners.subscribe(Box::new(listener) as Listener)
    }

    /// Listen to changes of a single item only.
    pub fn subscribe_item(
        &mut self,
        item: ItemId,
        listener: impl FnMut(&Change) + Send + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe_item(item, Box::new(listener) as Listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn emit(&mut self, change: Change) {
        self.listeners.emit(&change);
    }

    // ── Items ───────────────────────────────────────────────────────────────

    pub fn get_item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn has_item(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Id of the live file item at `path`.
    pub fn item_for_file(&self, path: &Path) -> Option<ItemId> {
        self.files.get(path).copied()
    }

    /// All items in id order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Register a newly constructed item.
    ///
    /// Rejects reused ids and paths that another file item already holds.
    /// Tags and group links are never carried in: they are attached
    /// afterwards through [`tag_item`](Self::tag_item) and
    /// [`add_to_group`](Self::add_to_group).
    pub fn add_item(&mut self, mut item: Item) -> Result<(), ModelError> {
        if self.items.contains_key(&item.id) {
            return Err(ModelError::DuplicateItemId(item.id));
        }
        if let Some(file) = item.file_info() {
            require_utf8(&file.path)?;
            if self.files.contains_key(&file.path) {
                return Err(ModelError::DuplicatePath(file.path.clone()));
            }
        }

        item.tags.clear();
        if let Some(file) = item.file_info_mut() {
            file.element_of = None;
        }
        if let Some(group) = item.group_info_mut() {
            group.items.clear();
        }

        if let Some(file) = item.file_info() {
            self.files.insert(file.path.clone(), item.id);
        }
        self.item_ids.observe(item.id.0);
        self.items.insert(item.id, item.clone());
        self.emit(Change::ItemAdded(item));
        Ok(())
    }

    /// Remove an item, detaching it from everything that references it
    /// first: its group (or its children), its tags and any pairs.
    pub fn remove_item(&mut self, id: ItemId) -> Result<bool, ModelError> {
        let Some(item) = self.items.get(&id) else {
            return Ok(false);
        };

        let parent = item.file_info().and_then(|f| f.element_of);
        let is_group = item.is_group();
        let tags: Vec<TagId> = item.tags.iter().copied().collect();

        if let Some(group) = parent {
            self.remove_from_group(group, id)?;
        }
        if is_group {
            self.clear_group(id)?;
        }
        for tag in tags {
            self.untag_item(id, tag)?;
        }

        let pairs: Vec<SimilarPair<ItemId>> = self
            .non_dupes
            .iter()
            .filter(|p| p.contains(&id))
            .copied()
            .collect();
        for pair in pairs {
            self.remove_non_dupe(&pair);
        }
        let pairs: Vec<SimilarPair<ItemId>> = self
            .similar
            .iter()
            .filter(|p| p.contains(&id))
            .copied()
            .collect();
        for pair in pairs {
            self.remove_similarity(&pair);
        }

        if let Some(item) = self.items.remove(&id)
            && let Some(file) = item.file_info()
        {
            self.files.remove(&file.path);
        }
        self.emit(Change::ItemRemoved(id));
        self.listeners.forget_item(id);
        Ok(true)
    }

    /// Hash, classify and register a file from disk, tagged with the
    /// default tag.
    ///
    /// Reads the whole file. Images get a histogram when they can be
    /// decoded; an image with no close match among existing images is
    /// flagged `no_similar`.
    pub fn create_file_item(&mut self, path: &Path) -> Result<ItemId, ModelError> {
        if self.has_file(path) {
            return Err(ModelError::DuplicatePath(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        let md5 = format!("{:x}", md5::compute(&bytes));
        let added = chrono::Utc::now().timestamp_millis();
        let id = self.reserve_item_id();

        let item = match ItemType::from_path(path) {
            ItemType::Image => {
                let histogram = match image::load_from_memory(&bytes) {
                    Ok(img) => Histogram::from_image(&img)
                        .map_err(|e| log::warn!("No histogram for {}: {e}", path.display()))
                        .ok(),
                    Err(e) => {
                        log::warn!("Failed to decode image {}: {e}", path.display());
                        None
                    }
                };
                let mut no_similar = true;
                if let Some(hist) = &histogram {
                    let related: Vec<ItemId> = self
                        .items
                        .values()
                        .filter(|other| {
                            other
                                .image_info()
                                .and_then(|i| i.histogram.as_ref())
                                .is_some_and(|h| h.similarity_to(hist) > NO_SIMILAR_MAX)
                        })
                        .map(Item::id)
                        .collect();
                    if !related.is_empty() {
                        no_similar = false;
                    }
                    for other in related {
                        self.set_image_no_similar(other, false)?;
                    }
                }
                Item::image(id, added, md5, path, no_similar, histogram)
            }
            ItemType::Video => Item::video(id, added, md5, path),
            _ => Item::file(id, added, md5, path),
        };

        self.add_item(item)?;
        let tag = self.default_tag_id()?;
        self.tag_item(id, tag)?;
        Ok(id)
    }

    /// Create and register an empty group, tagged with the default tag.
    pub fn create_group(&mut self, title: &str) -> Result<ItemId, ModelError> {
        let id = self.reserve_item_id();
        let added = chrono::Utc::now().timestamp_millis();
        self.add_item(Item::group(id, added, title))?;
        let tag = self.default_tag_id()?;
        self.tag_item(id, tag)?;
        Ok(id)
    }

    fn default_tag_id(&mut self) -> Result<TagId, ModelError> {
        let name = self.default_tag.clone();
        self.get_or_make_tag(&name)
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut Item, ModelError> {
        self.items.get_mut(&id).ok_or(ModelError::UnknownItem(id))
    }

    // ── Tagging ─────────────────────────────────────────────────────────────

    /// Returns `Ok(false)` if the item already holds the tag.
    pub fn tag_item(&mut self, item: ItemId, tag: TagId) -> Result<bool, ModelError> {
        if !self.tags.contains_key(&tag) {
            return Err(ModelError::UnknownTag(tag));
        }
        if !self.item_mut(item)?.tags.insert(tag) {
            return Ok(false);
        }
        if let Some(t) = self.tags.get_mut(&tag) {
            t.frequency += 1;
        }
        self.emit(Change::Tags(TagDelta::Added { item, tag }));
        Ok(true)
    }

    /// Returns `Ok(false)` if the item did not hold the tag.
    pub fn untag_item(&mut self, item: ItemId, tag: TagId) -> Result<bool, ModelError> {
        if !self.item_mut(item)?.tags.remove(&tag) {
            return Ok(false);
        }
        if let Some(t) = self.tags.get_mut(&tag) {
            t.frequency = t.frequency.saturating_sub(1);
        }
        self.emit(Change::Tags(TagDelta::Removed { item, tag }));
        Ok(true)
    }

    // ── File, image and group fields ────────────────────────────────────────

    pub fn set_file_md5(&mut self, id: ItemId, md5: &str) -> Result<bool, ModelError> {
        let file = self
            .item_mut(id)?
            .file_info_mut()
            .ok_or(ModelError::wrong_kind(id, "a file"))?;
        if file.md5 == md5 {
            return Ok(false);
        }
        let old = std::mem::replace(&mut file.md5, md5.to_string());
        self.emit(Change::File(FileDelta {
            item: id,
            field: FileField::Md5(Delta::new(old, md5.to_string())),
        }));
        Ok(true)
    }

    /// Point a file item at a new path. The path must not belong to another
    /// live file item.
    pub fn set_file_path(&mut self, id: ItemId, path: &Path) -> Result<bool, ModelError> {
        require_utf8(path)?;
        if let Some(owner) = self.files.get(path) {
            return if *owner == id {
                Ok(false)
            } else {
                Err(ModelError::DuplicatePath(path.to_path_buf()))
            };
        }
        let file = self
            .item_mut(id)?
            .file_info_mut()
            .ok_or(ModelError::wrong_kind(id, "a file"))?;
        let old = std::mem::replace(&mut file.path, path.to_path_buf());
        self.files.remove(&old);
        self.files.insert(path.to_path_buf(), id);
        self.emit(Change::File(FileDelta {
            item: id,
            field: FileField::Path(Delta::new(old, path.to_path_buf())),
        }));
        Ok(true)
    }

    pub fn set_image_no_similar(&mut self, id: ItemId, no_similar: bool) -> Result<bool, ModelError> {
        let image = self
            .item_mut(id)?
            .image_info_mut()
            .ok_or(ModelError::wrong_kind(id, "an image"))?;
        if image.no_similar == no_similar {
            return Ok(false);
        }
        image.no_similar = no_similar;
        self.emit(Change::Image(ImageDelta {
            item: id,
            field: ImageField::NoSimilar(Delta::new(!no_similar, no_similar)),
        }));
        Ok(true)
    }

    pub fn set_image_histogram(
        &mut self,
        id: ItemId,
        histogram: Option<Histogram>,
    ) -> Result<bool, ModelError> {
        let image = self
            .item_mut(id)?
            .image_info_mut()
            .ok_or(ModelError::wrong_kind(id, "an image"))?;
        if image.histogram == histogram {
            return Ok(false);
        }
        let old = std::mem::replace(&mut image.histogram, histogram.clone());
        self.emit(Change::Image(ImageDelta {
            item: id,
            field: ImageField::Histogram(Delta::new(old, histogram)),
        }));
        Ok(true)
    }

    pub fn set_group_title(&mut self, id: ItemId, title: &str) -> Result<bool, ModelError> {
        let group = self
            .item_mut(id)?
            .group_info_mut()
            .ok_or(ModelError::wrong_kind(id, "a group"))?;
        if group.title == title {
            return Ok(false);
        }
        let old = std::mem::replace(&mut group.title, title.to_string());
        self.emit(Change::Group(GroupDelta {
            item: id,
            field: GroupField::Title(Delta::new(old, title.to_string())),
        }));
        Ok(true)
    }

    // ── Group membership ────────────────────────────────────────────────────

    fn group_children(&self, group: ItemId) -> Result<&Vec<ItemId>, ModelError> {
        self.items
            .get(&group)
            .ok_or(ModelError::UnknownItem(group))?
            .group_info()
            .map(|g| &g.items)
            .ok_or(ModelError::wrong_kind(group, "a group"))
    }

    fn set_element_of(&mut self, child: ItemId, group: Option<ItemId>) -> Result<(), ModelError> {
        let file = self
            .item_mut(child)?
            .file_info_mut()
            .ok_or(ModelError::wrong_kind(child, "a file"))?;
        let old = std::mem::replace(&mut file.element_of, group);
        if old != group {
            self.emit(Change::File(FileDelta {
                item: child,
                field: FileField::ElementOf(Delta::new(old, group)),
            }));
        }
        Ok(())
    }

    fn emit_group_items(&mut self, group: ItemId) -> Result<(), ModelError> {
        let items = self.group_children(group)?.clone();
        self.emit(Change::Group(GroupDelta {
            item: group,
            field: GroupField::Items(items),
        }));
        Ok(())
    }

    /// Add a file item to a group, at `index` or at the end. A file that
    /// already belongs to another group is moved out of it first.
    pub fn add_to_group(
        &mut self,
        group: ItemId,
        child: ItemId,
        index: Option<usize>,
    ) -> Result<bool, ModelError> {
        let children = self.group_children(group)?;
        if children.contains(&child) {
            return Ok(false);
        }
        let child_item = self.get_item(child).ok_or(ModelError::UnknownItem(child))?;
        if child_item.is_group() {
            return Err(ModelError::GroupInGroup { group, child });
        }
        let previous = child_item
            .file_info()
            .ok_or(ModelError::wrong_kind(child, "a file"))?
            .element_of;

        if let Some(previous) = previous {
            self.remove_from_group(previous, child)?;
        }
        self.set_element_of(child, Some(group))?;

        let items = &mut self
            .item_mut(group)?
            .group_info_mut()
            .ok_or(ModelError::wrong_kind(group, "a group"))?
            .items;
        let len = items.len();
        items.insert(index.map_or(len, |i| i.min(len)), child);
        self.emit_group_items(group)?;
        Ok(true)
    }

    pub fn remove_from_group(&mut self, group: ItemId, child: ItemId) -> Result<bool, ModelError> {
        if !self.group_children(group)?.contains(&child) {
            return Ok(false);
        }
        self.set_element_of(child, None)?;
        if let Some(g) = self.item_mut(group)?.group_info_mut() {
            g.items.retain(|id| *id != child);
        }
        self.emit_group_items(group)?;
        Ok(true)
    }

    /// Reorder a child within its group. Out of range indices move it to
    /// the end.
    pub fn move_in_group(
        &mut self,
        group: ItemId,
        child: ItemId,
        index: usize,
    ) -> Result<bool, ModelError> {
        let children = self.group_children(group)?;
        let Some(current) = children.iter().position(|id| *id == child) else {
            return Ok(false);
        };
        let target = index.min(children.len() - 1);
        if current == target {
            return Ok(false);
        }
        if let Some(g) = self.item_mut(group)?.group_info_mut() {
            let moved = g.items.remove(current);
            g.items.insert(target, moved);
        }
        self.emit_group_items(group)?;
        Ok(true)
    }

    /// Release every child of a group.
    pub fn clear_group(&mut self, group: ItemId) -> Result<bool, ModelError> {
        let children = self.group_children(group)?.clone();
        if children.is_empty() {
            return Ok(false);
        }
        for child in &children {
            self.set_element_of(*child, None)?;
        }
        if let Some(g) = self.item_mut(group)?.group_info_mut() {
            g.items.clear();
        }
        self.emit_group_items(group)?;
        Ok(true)
    }

    // ── Tags ────────────────────────────────────────────────────────────────

    pub fn get_tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    pub fn has_tag(&self, id: TagId) -> bool {
        self.tags.contains_key(&id)
    }

    /// Case-insensitive lookup by name.
    pub fn get_tag_by_name(&self, name: &str) -> Option<&Tag> {
        self.tag_names
            .get(&normalize_name(name))
            .and_then(|id| self.tags.get(id))
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Register a constructed tag. Its frequency starts at zero and grows
    /// as items are tagged.
    pub fn add_tag(&mut self, mut tag: Tag) -> Result<(), ModelError> {
        if self.tags.contains_key(&tag.id) {
            return Err(ModelError::DuplicateTagId(tag.id));
        }
        if self.tag_names.contains_key(&tag.name) {
            return Err(ModelError::DuplicateTagName(tag.name));
        }
        tag.frequency = 0;
        self.tag_ids.observe(tag.id.0);
        self.tag_names.insert(tag.name.clone(), tag.id);
        self.tags.insert(tag.id, tag.clone());
        self.emit(Change::TagAdded(tag));
        Ok(())
    }

    pub fn create_tag(&mut self, name: &str, color: Option<String>) -> Result<TagId, ModelError> {
        if self.tag_names.contains_key(&normalize_name(name)) {
            return Err(ModelError::DuplicateTagName(normalize_name(name)));
        }
        let id = self.reserve_tag_id();
        self.add_tag(Tag::new(id, name, color))?;
        Ok(id)
    }

    pub fn get_or_make_tag(&mut self, name: &str) -> Result<TagId, ModelError> {
        match self.get_tag_by_name(name) {
            Some(tag) => Ok(tag.id),
            None => self.create_tag(name, None),
        }
    }

    /// Remove a tag, untagging every item that holds it first.
    pub fn remove_tag(&mut self, id: TagId) -> Result<bool, ModelError> {
        if !self.tags.contains_key(&id) {
            return Ok(false);
        }
        let holders: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| item.has_tag(id))
            .map(Item::id)
            .collect();
        for item in holders {
            self.untag_item(item, id)?;
        }
        if let Some(tag) = self.tags.remove(&id) {
            self.tag_names.remove(&tag.name);
        }
        self.emit(Change::TagRemoved(id));
        Ok(true)
    }

    pub fn set_tag_color(&mut self, id: TagId, color: Option<String>) -> Result<bool, ModelError> {
        let tag = self.tags.get_mut(&id).ok_or(ModelError::UnknownTag(id))?;
        if tag.color == color {
            return Ok(false);
        }
        let old = std::mem::replace(&mut tag.color, color.clone());
        self.emit(Change::TagColor {
            tag: id,
            delta: Delta::new(old, color),
        });
        Ok(true)
    }

    // ── Duplicate bookkeeping ───────────────────────────────────────────────

    fn check_pair(&self, pair: &SimilarPair<ItemId>) -> Result<(), ModelError> {
        for id in [pair.first(), pair.second()] {
            if !self.items.contains_key(id) {
                return Err(ModelError::UnknownItem(*id));
            }
        }
        Ok(())
    }

    pub fn has_non_dupe(&self, pair: &SimilarPair<ItemId>) -> bool {
        self.non_dupes.contains(pair)
    }

    pub fn non_dupes(&self) -> impl Iterator<Item = &SimilarPair<ItemId>> {
        self.non_dupes.iter()
    }

    /// Record that two items are known not to be duplicates.
    pub fn add_non_dupe(&mut self, pair: SimilarPair<ItemId>) -> Result<bool, ModelError> {
        self.check_pair(&pair)?;
        if !self.non_dupes.insert(pair) {
            return Ok(false);
        }
        self.emit(Change::NonDupeAdded(pair));
        Ok(true)
    }

    pub fn remove_non_dupe(&mut self, pair: &SimilarPair<ItemId>) -> bool {
        match self.non_dupes.take(pair) {
            Some(stored) => {
                self.emit(Change::NonDupeRemoved(stored));
                true
            }
            None => false,
        }
    }

    pub fn similar_pairs(&self) -> &[SimilarPair<ItemId>] {
        &self.similar
    }

    /// Record a detected similarity. Pairs already known, or known not to
    /// be duplicates, are rejected.
    pub fn add_similarity(&mut self, pair: SimilarPair<ItemId>) -> Result<bool, ModelError> {
        self.check_pair(&pair)?;
        if self.similar.contains(&pair) || self.non_dupes.contains(&pair) {
            return Ok(false);
        }
        self.similar.push(pair);
        self.emit(Change::SimilarAdded(pair));
        Ok(true)
    }

    pub fn remove_similarity(&mut self, pair: &SimilarPair<ItemId>) -> bool {
        let Some(pos) = self.similar.iter().position(|p| p == pair) else {
            return false;
        };
        let stored = self.similar.remove(pos);
        self.emit(Change::SimilarRemoved(stored));
        true
    }

    /// Drop similar pairs that have since been marked as non-duplicates.
    pub fn purge_similar_non_dupes(&mut self) -> usize {
        let purged: Vec<SimilarPair<ItemId>> = self
            .similar
            .iter()
            .filter(|p| self.non_dupes.contains(*p))
            .copied()
            .collect();
        for pair in &purged {
            self.remove_similarity(pair);
        }
        purged.len()
    }
}

fn require_utf8(path: &Path) -> Result<(), ModelError> {
    match path.to_str() {
        Some(_) => Ok(()),
        None => Err(ModelError::NonUtf8Path(path.to_path_buf())),
    }
}

#[cfg(test)]
#[path = "tests/menagerie_tests.rs"]
mod tests;
