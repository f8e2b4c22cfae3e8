use std::path::Path;

use menagerie_core::{Histogram, Item, ItemId, ItemType, Menagerie, SimilarPair, TagId};
use menagerie_db::{DatabaseError, MenagerieDatabase};

fn open_ready(path: &Path) -> MenagerieDatabase {
    let db = MenagerieDatabase::open(path).unwrap();
    db.migrate().unwrap();
    db
}

fn reload(path: &Path) -> (MenagerieDatabase, Menagerie) {
    let mut db = MenagerieDatabase::open(path).unwrap();
    assert!(!db.needs_migration().unwrap());
    let (menagerie, _) = db.load_menagerie().unwrap();
    (db, menagerie)
}

fn children(m: &Menagerie, group: ItemId) -> Vec<ItemId> {
    m.get_item(group).unwrap().group_info().unwrap().items().to_vec()
}

#[test]
fn load_requires_migrated_store() {
    let mut db = MenagerieDatabase::open_memory().unwrap();
    assert!(matches!(
        db.load_menagerie(),
        Err(DatabaseError::NeedsMigration {
            found: -1,
            required: 10
        })
    ));
}

#[test]
fn empty_store_loads_empty_menagerie() {
    let mut db = MenagerieDatabase::open_memory().unwrap();
    db.migrate().unwrap();
    let (m, report) = db.load_menagerie().unwrap();
    assert_eq!(m.item_count(), 0);
    assert_eq!(report.orphans, 0);
    db.close();
}

#[test]
fn mutations_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menagerie.db");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, b"some notes").unwrap();

    let hist = Histogram::new([0.25; 32], [0.5; 32], [0.125; 32], [0.0; 32]);
    let (group, file, image, video, imported);
    {
        let mut db = open_ready(&path);
        let (mut m, _) = db.load_menagerie().unwrap();

        group = m.create_group("holiday").unwrap();
        file = m.reserve_item_id();
        m.add_item(Item::file(file, 100, "f00", "/a/readme.txt")).unwrap();
        image = m.reserve_item_id();
        m.add_item(Item::image(image, 200, "1ma6e", "/a/pic.jpg", false, Some(hist.clone())))
            .unwrap();
        video = m.reserve_item_id();
        m.add_item(Item::video(video, 300, "71de0", "/a/clip.webm")).unwrap();
        imported = m.create_file_item(&notes).unwrap();

        m.add_to_group(group, image, None).unwrap();
        m.add_to_group(group, file, Some(0)).unwrap();

        let red = m.create_tag("Red", Some("#f00".into())).unwrap();
        m.tag_item(image, red).unwrap();
        m.tag_item(video, red).unwrap();
        m.set_tag_color(red, Some("#ff0000".into())).unwrap();

        m.set_file_md5(file, "f01").unwrap();
        m.set_group_title(group, "summer holiday").unwrap();
        m.set_image_no_similar(image, true).unwrap();

        m.add_non_dupe(SimilarPair::new(file, video, 1.0).unwrap()).unwrap();
        m.add_similarity(SimilarPair::new(image, video, 0.95).unwrap()).unwrap();

        db.flush();
        db.close();
    }

    let (mut db, m) = reload(&path);
    assert_eq!(m.item_count(), 5);

    let g = m.get_item(group).unwrap();
    assert_eq!(g.group_info().unwrap().title(), "summer holiday");
    assert_eq!(children(&m, group), vec![file, image]);
    for child in [file, image] {
        let info = m.get_item(child).unwrap().file_info().unwrap();
        assert_eq!(info.element_of(), Some(group));
    }

    let f = m.get_item(file).unwrap();
    assert_eq!(f.item_type(), ItemType::File);
    assert_eq!(f.added(), 100);
    assert_eq!(f.file_info().unwrap().md5(), "f01");

    let img = m.get_item(image).unwrap();
    assert_eq!(img.item_type(), ItemType::Image);
    assert!(img.image_info().unwrap().no_similar());
    assert_eq!(img.image_info().unwrap().histogram(), Some(&hist));

    assert_eq!(m.get_item(video).unwrap().item_type(), ItemType::Video);

    let red = m.get_tag_by_name("red").unwrap();
    assert_eq!(red.color(), Some("#ff0000"));
    assert_eq!(red.frequency(), 2);
    let tagme = m.get_tag_by_name("tagme").unwrap();
    assert_eq!(tagme.frequency(), 2);
    assert!(m.get_item(imported).unwrap().has_tag(tagme.id()));
    assert!(m.get_item(group).unwrap().has_tag(tagme.id()));

    assert!(m.has_non_dupe(&SimilarPair::new(video, file, 0.0).unwrap()));
    let similar = m.similar_pairs();
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].similarity(), 0.95);

    assert!(m.next_item_id() > imported);
    assert!(m.next_tag_id() > red.id());
    db.close();
}

#[test]
fn removals_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menagerie.db");

    let (group, a, b);
    {
        let mut db = open_ready(&path);
        let (mut m, _) = db.load_menagerie().unwrap();
        group = m.create_group("set").unwrap();
        a = m.reserve_item_id();
        m.add_item(Item::file(a, 0, "a", "/a")).unwrap();
        b = m.reserve_item_id();
        m.add_item(Item::file(b, 0, "b", "/b")).unwrap();
        m.add_to_group(group, a, None).unwrap();
        m.add_to_group(group, b, None).unwrap();
        m.add_non_dupe(SimilarPair::new(a, b, 1.0).unwrap()).unwrap();

        m.remove_item(a).unwrap();
        let tagme = m.get_tag_by_name("tagme").unwrap().id();
        m.remove_tag(tagme).unwrap();
        db.flush();
    }

    let (mut db, m) = reload(&path);
    assert!(!m.has_item(a));
    assert_eq!(children(&m, group), vec![b]);
    assert_eq!(m.non_dupes().count(), 0);
    assert!(m.get_tag_by_name("tagme").is_none());
    db.close();
}

#[test]
fn orphaned_rows_are_dropped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menagerie.db");
    {
        let db = open_ready(&path);
        db.connection()
            .unwrap()
            .execute_batch(
                "INSERT INTO items (id, added) VALUES (1, 0), (2, 0), (50, 0);
                 INSERT INTO files (id, md5, file) VALUES (1, 'x', '/x.txt');
                 INSERT INTO groups (id, title, items) VALUES (2, 'g', '1,50,zz');",
            )
            .unwrap();
    }

    let mut db = MenagerieDatabase::open(&path).unwrap();
    let (m, report) = db.load_menagerie().unwrap();
    assert_eq!(report.items, 2);
    assert_eq!(report.orphans, 1);
    assert_eq!(report.skipped, 2);
    assert!(!m.has_item(ItemId(50)));
    assert_eq!(children(&m, ItemId(2)), vec![ItemId(1)]);
    // Past the orphan, whose row is still in storage.
    assert_eq!(m.next_item_id(), ItemId(51));
    db.close();
}

#[test]
fn loading_does_not_write_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menagerie.db");
    {
        let mut db = open_ready(&path);
        let (mut m, _) = db.load_menagerie().unwrap();
        m.create_tag("only", None).unwrap();
        db.flush();
    }

    let (mut db, _m) = reload(&path);
    db.flush();
    let rows: i64 = db
        .connection()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
    db.close();
}

#[test]
fn close_and_compress_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menagerie.db");
    {
        let mut db = open_ready(&path);
        let (mut m, _) = db.load_menagerie().unwrap();
        m.create_group("kept").unwrap();
        db.close_and_compress().unwrap();
    }

    let (mut db, m) = reload(&path);
    assert_eq!(m.item_count(), 1);
    db.close();
}

#[test]
fn schema_changes_wait_for_the_worker() {
    let mut db = MenagerieDatabase::open_memory().unwrap();
    db.migrate().unwrap();
    let (mut m, _) = db.load_menagerie().unwrap();
    let group = m.create_group("live").unwrap();
    db.flush();

    assert!(matches!(db.reinitialize(), Err(DatabaseError::WorkerRunning)));
    assert!(matches!(db.migrate(), Err(DatabaseError::WorkerRunning)));
    let kept: i64 = db
        .connection()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM groups WHERE id = ?1", [group.0], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(kept, 1);

    db.close();
    assert_eq!(db.reinitialize().unwrap(), 10);
}

#[test]
fn attach_resumes_persistence_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menagerie.db");
    let group;
    {
        let mut db = open_ready(&path);
        let (mut m, _) = db.load_menagerie().unwrap();
        db.close();
        assert!(!db.is_updating());

        db.attach(&mut m).unwrap();
        group = m.create_group("after restart").unwrap();
        db.flush();
        db.close();
    }

    let (mut db, m) = reload(&path);
    assert_eq!(m.get_item(group).unwrap().group_info().unwrap().title(), "after restart");
    db.close();
}

#[test]
fn non_ascii_paths_load_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menagerie.db");
    let stored = Path::new("/media/café/ünïcode.png");
    let id;
    {
        let mut db = open_ready(&path);
        let (mut m, _) = db.load_menagerie().unwrap();
        id = m.reserve_item_id();
        m.add_item(Item::file(id, 0, "m", stored)).unwrap();
        db.flush();
        db.close();
    }

    let (mut db, m) = reload(&path);
    assert_eq!(m.get_item(id).unwrap().file_info().unwrap().path(), stored);
    assert_eq!(m.item_for_file(stored), Some(id));
    db.close();
}

#[test]
fn clashing_tag_names_are_skipped() {
    let mut db = MenagerieDatabase::open_memory().unwrap();
    db.migrate().unwrap();
    db.connection()
        .unwrap()
        .execute_batch(
            "INSERT INTO tags (id, name) VALUES (1, 'Blue'), (2, 'blue'), (3, 'red');
             INSERT INTO items (id, added) VALUES (1, 0);
             INSERT INTO files (id, md5, file) VALUES (1, 'x', '/x.txt');
             INSERT INTO tagged (item_id, tag_id) VALUES (1, 2), (1, 3);",
        )
        .unwrap();

    let (m, report) = db.load_menagerie().unwrap();
    assert_eq!(report.tags, 2);
    // The clashing tag and its one association.
    assert_eq!(report.skipped, 2);
    assert_eq!(m.get_tag_by_name("BLUE").unwrap().id(), TagId(1));
    assert!(m.get_item(ItemId(1)).unwrap().has_tag(TagId(3)));
    db.close();
}
