use std::sync::{Arc, Mutex};

use super::*;

fn file(m: &mut Menagerie, path: &str) -> ItemId {
    let id = m.reserve_item_id();
    m.add_item(Item::file(id, 0, "md5", path)).unwrap();
    id
}

fn group(m: &mut Menagerie, title: &str) -> ItemId {
    let id = m.reserve_item_id();
    m.add_item(Item::group(id, 0, title)).unwrap();
    id
}

fn record(m: &mut Menagerie) -> Arc<Mutex<Vec<Change>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    m.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
    seen
}

fn frequency(m: &Menagerie, tag: TagId) -> usize {
    m.get_tag(tag).unwrap().frequency()
}

#[test]
fn added_item_is_retrievable_by_reserved_id() {
    let mut m = Menagerie::new();
    let id = file(&mut m, "/a.txt");
    assert_eq!(m.get_item(id).unwrap().id(), id);
    assert!(m.has_file(std::path::Path::new("/a.txt")));
}

#[test]
fn reused_item_id_is_rejected() {
    let mut m = Menagerie::new();
    let id = file(&mut m, "/a.txt");
    let err = m.add_item(Item::file(id, 0, "x", "/b.txt")).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateItemId(dup) if dup == id));
    assert_eq!(m.item_count(), 1);
}

#[test]
fn duplicate_path_is_rejected() {
    let mut m = Menagerie::new();
    file(&mut m, "/a.txt");
    let id = m.reserve_item_id();
    assert!(matches!(
        m.add_item(Item::video(id, 0, "x", "/a.txt")),
        Err(ModelError::DuplicatePath(_))
    ));
}

#[test]
fn counter_never_reuses_ids() {
    let mut m = Menagerie::new();
    m.add_item(Item::file(ItemId(41), 0, "x", "/x")).unwrap();
    assert_eq!(m.reserve_item_id(), ItemId(42));
    assert_eq!(m.reserve_item_id(), ItemId(43));

    let id = file(&mut m, "/y");
    m.remove_item(id).unwrap();
    assert!(m.reserve_item_id() > id);
}

#[test]
fn tag_frequency_scenario() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let b = file(&mut m, "/b");
    let foo = m.create_tag("foo", None).unwrap();
    assert_eq!(frequency(&m, foo), 0);

    assert!(m.tag_item(a, foo).unwrap());
    assert_eq!(frequency(&m, foo), 1);
    assert!(m.tag_item(b, foo).unwrap());
    assert_eq!(frequency(&m, foo), 2);
    assert!(m.untag_item(a, foo).unwrap());
    assert_eq!(frequency(&m, foo), 1);
    assert!(m.untag_item(b, foo).unwrap());
    assert_eq!(frequency(&m, foo), 0);
}

#[test]
fn repeated_tagging_is_a_silent_no_op() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let foo = m.create_tag("foo", None).unwrap();
    let seen = record(&mut m);

    assert!(m.tag_item(a, foo).unwrap());
    assert!(!m.tag_item(a, foo).unwrap());
    assert_eq!(frequency(&m, foo), 1);
    assert_eq!(seen.lock().unwrap().len(), 1);

    let bar = m.create_tag("bar", None).unwrap();
    assert!(!m.untag_item(a, bar).unwrap());
}

#[test]
fn tag_names_are_case_insensitive() {
    let mut m = Menagerie::new();
    let id = m.create_tag("Landscape", None).unwrap();
    assert_eq!(m.get_tag(id).unwrap().name(), "landscape");
    assert_eq!(m.get_tag_by_name("LANDSCAPE").unwrap().id(), id);
    assert!(matches!(
        m.create_tag("landscape", None),
        Err(ModelError::DuplicateTagName(_))
    ));
    assert_eq!(m.get_or_make_tag("LandScape").unwrap(), id);
}

#[test]
fn removing_tag_untags_holders() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let foo = m.create_tag("foo", None).unwrap();
    m.tag_item(a, foo).unwrap();
    assert!(m.remove_tag(foo).unwrap());
    assert!(!m.get_item(a).unwrap().has_tag(foo));
    assert!(m.get_tag_by_name("foo").is_none());
}

#[test]
fn setters_emit_old_and_new_values() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let seen = record(&mut m);

    assert!(m.set_file_md5(a, "new").unwrap());
    assert!(!m.set_file_md5(a, "new").unwrap());
    assert!(m.set_file_path(a, std::path::Path::new("/moved")).unwrap());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(
        seen[0],
        Change::File(FileDelta {
            item: a,
            field: FileField::Md5(Delta::new("md5".to_string(), "new".to_string())),
        })
    );
    assert!(m.has_file(std::path::Path::new("/moved")));
    assert!(!m.has_file(std::path::Path::new("/a")));
}

#[test]
fn set_path_to_taken_path_fails() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    file(&mut m, "/b");
    assert!(m.set_file_path(a, std::path::Path::new("/b")).is_err());
    assert!(!m.set_file_path(a, std::path::Path::new("/a")).unwrap());
}

#[cfg(unix)]
#[test]
fn non_utf8_paths_are_rejected() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let raw = std::path::Path::new(OsStr::from_bytes(b"/media/caf\xE9.png"));
    let mut m = Menagerie::new();
    let id = m.reserve_item_id();
    assert!(matches!(
        m.add_item(Item::file(id, 0, "m", raw)),
        Err(ModelError::NonUtf8Path(_))
    ));
    assert!(!m.has_item(id));

    let a = file(&mut m, "/a");
    let changes = record(&mut m);
    assert!(matches!(
        m.set_file_path(a, raw),
        Err(ModelError::NonUtf8Path(_))
    ));
    assert!(m.has_file(std::path::Path::new("/a")));
    assert!(changes.lock().unwrap().is_empty());
}

#[test]
fn setters_check_item_kind() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let g = group(&mut m, "g");
    assert!(matches!(
        m.set_image_no_similar(a, true),
        Err(ModelError::WrongKind { .. })
    ));
    assert!(m.set_group_title(a, "x").is_err());
    assert!(m.set_file_md5(g, "x").is_err());
    assert!(m.set_group_title(g, "renamed").unwrap());
}

#[test]
fn group_links_are_bidirectional() {
    let mut m = Menagerie::new();
    let g = group(&mut m, "g");
    let a = file(&mut m, "/a");
    let b = file(&mut m, "/b");

    assert!(m.add_to_group(g, a, None).unwrap());
    assert!(m.add_to_group(g, b, Some(0)).unwrap());
    assert!(!m.add_to_group(g, a, None).unwrap());

    let children = m.get_item(g).unwrap().group_info().unwrap().items().to_vec();
    assert_eq!(children, vec![b, a]);
    for child in children {
        let owner = m.get_item(child).unwrap().file_info().unwrap().element_of();
        assert_eq!(owner, Some(g));
    }

    assert!(m.move_in_group(g, b, 5).unwrap());
    assert_eq!(m.get_item(g).unwrap().group_info().unwrap().items(), &[a, b]);
}

#[test]
fn adding_to_another_group_moves_the_file() {
    let mut m = Menagerie::new();
    let g1 = group(&mut m, "one");
    let g2 = group(&mut m, "two");
    let a = file(&mut m, "/a");
    m.add_to_group(g1, a, None).unwrap();
    m.add_to_group(g2, a, None).unwrap();
    assert!(m.get_item(g1).unwrap().group_info().unwrap().items().is_empty());
    assert_eq!(m.get_item(a).unwrap().file_info().unwrap().element_of(), Some(g2));
}

#[test]
fn group_cannot_contain_group() {
    let mut m = Menagerie::new();
    let g1 = group(&mut m, "one");
    let g2 = group(&mut m, "two");
    assert!(matches!(
        m.add_to_group(g1, g2, None),
        Err(ModelError::GroupInGroup { .. })
    ));
}

#[test]
fn removing_grouped_file_cascades_out_of_group() {
    let mut m = Menagerie::new();
    let g = group(&mut m, "g");
    let a = file(&mut m, "/a");
    let b = file(&mut m, "/b");
    m.add_to_group(g, a, None).unwrap();
    m.add_to_group(g, b, None).unwrap();

    assert!(m.remove_item(a).unwrap());
    assert_eq!(m.get_item(g).unwrap().group_info().unwrap().items(), &[b]);
    assert!(!m.has_item(a));
    assert!(!m.has_file(std::path::Path::new("/a")));
}

#[test]
fn removing_group_releases_children() {
    let mut m = Menagerie::new();
    let g = group(&mut m, "g");
    let a = file(&mut m, "/a");
    m.add_to_group(g, a, None).unwrap();
    m.remove_item(g).unwrap();
    assert_eq!(m.get_item(a).unwrap().file_info().unwrap().element_of(), None);
}

#[test]
fn removing_item_releases_tags_and_pairs() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let b = file(&mut m, "/b");
    let c = file(&mut m, "/c");
    let foo = m.create_tag("foo", None).unwrap();
    m.tag_item(a, foo).unwrap();
    m.add_non_dupe(SimilarPair::new(a, b, 0.5).unwrap()).unwrap();
    assert!(m.add_similarity(SimilarPair::new(c, a, 0.97).unwrap()).unwrap());

    m.remove_item(a).unwrap();
    assert_eq!(frequency(&m, foo), 0);
    assert_eq!(m.non_dupes().count(), 0);
    assert!(m.similar_pairs().is_empty());
}

#[test]
fn remove_emits_item_removed_last() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let foo = m.create_tag("foo", None).unwrap();
    m.tag_item(a, foo).unwrap();
    let seen = record(&mut m);
    m.remove_item(a).unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.last(), Some(&Change::ItemRemoved(a)));
    assert!(seen.contains(&Change::Tags(TagDelta::Removed { item: a, tag: foo })));
}

#[test]
fn non_dupes_are_order_insensitive() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let b = file(&mut m, "/b");
    assert!(m.add_non_dupe(SimilarPair::new(a, b, 1.0).unwrap()).unwrap());
    assert!(!m.add_non_dupe(SimilarPair::new(b, a, 1.0).unwrap()).unwrap());
    assert!(m.has_non_dupe(&SimilarPair::new(b, a, 0.0).unwrap()));
    assert!(m.remove_non_dupe(&SimilarPair::new(b, a, 0.0).unwrap()));
    assert!(!m.has_non_dupe(&SimilarPair::new(a, b, 0.0).unwrap()));
}

#[test]
fn similarity_with_known_non_dupe_is_rejected_and_purged() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let b = file(&mut m, "/b");
    let c = file(&mut m, "/c");
    m.add_similarity(SimilarPair::new(a, b, 0.96).unwrap()).unwrap();
    m.add_non_dupe(SimilarPair::new(c, a, 1.0).unwrap()).unwrap();
    assert!(!m.add_similarity(SimilarPair::new(a, c, 0.99).unwrap()).unwrap());

    m.add_non_dupe(SimilarPair::new(a, b, 1.0).unwrap()).unwrap();
    assert_eq!(m.purge_similar_non_dupes(), 1);
    assert!(m.similar_pairs().is_empty());
}

#[test]
fn per_item_listener_only_sees_its_item() {
    let mut m = Menagerie::new();
    let a = file(&mut m, "/a");
    let b = file(&mut m, "/b");
    let seen = Arc::new(Mutex::new(0));
    let sink = seen.clone();
    let sub = m.subscribe_item(a, move |_| *sink.lock().unwrap() += 1);

    m.set_file_md5(b, "other").unwrap();
    m.set_file_md5(a, "mine").unwrap();
    assert_eq!(*seen.lock().unwrap(), 1);

    assert!(m.unsubscribe(sub));
    m.set_file_md5(a, "again").unwrap();
    assert_eq!(*seen.lock().unwrap(), 1);
}

#[test]
fn tag_color_change_is_reported() {
    let mut m = Menagerie::new();
    let foo = m.create_tag("foo", None).unwrap();
    let seen = record(&mut m);
    assert!(m.set_tag_color(foo, Some("#ff0000".into())).unwrap());
    assert!(!m.set_tag_color(foo, Some("#ff0000".into())).unwrap());
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(m.get_tag(foo).unwrap().color(), Some("#ff0000"));
}

#[test]
fn create_file_item_hashes_and_tags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"hello").unwrap();

    let mut m = Menagerie::new();
    let id = m.create_file_item(&path).unwrap();
    let item = m.get_item(id).unwrap();
    assert_eq!(item.item_type(), ItemType::File);
    assert_eq!(item.file_info().unwrap().md5(), "5d41402abc4b2a76b9719d911017c592");
    let tagme = m.get_tag_by_name(DEFAULT_TAG).unwrap();
    assert!(item.has_tag(tagme.id()));
    assert_eq!(tagme.frequency(), 1);

    assert!(matches!(
        m.create_file_item(&path),
        Err(ModelError::DuplicatePath(_))
    ));
}

#[test]
fn create_file_item_classifies_images_and_videos() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("pic.png");
    image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 200, 30, 255]))
        .save(&png)
        .unwrap();
    let copy = dir.path().join("copy.png");
    std::fs::copy(&png, &copy).unwrap();
    let video = dir.path().join("clip.MP4");
    std::fs::write(&video, b"not really a video").unwrap();

    let mut m = Menagerie::new();
    let first = m.create_file_item(&png).unwrap();
    assert!(m.get_item(first).unwrap().image_info().unwrap().no_similar());

    let second = m.create_file_item(&copy).unwrap();
    let info = m.get_item(second).unwrap().image_info().unwrap();
    assert!(info.histogram().is_some());
    assert!(!info.no_similar());
    assert!(!m.get_item(first).unwrap().image_info().unwrap().no_similar());

    let clip = m.create_file_item(&video).unwrap();
    assert_eq!(m.get_item(clip).unwrap().item_type(), ItemType::Video);
}

#[test]
fn seed_counters_moves_past_loaded_ids() {
    let mut m = Menagerie::new();
    m.add_tag(Tag::new(TagId(9), "nine", None)).unwrap();
    m.add_item(Item::group(ItemId(20), 0, "g")).unwrap();
    m.seed_counters();
    assert_eq!(m.next_item_id(), ItemId(21));
    assert_eq!(m.next_tag_id(), TagId(10));
}
