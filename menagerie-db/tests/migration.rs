use menagerie_db::{
    DatabaseError, LEGACY, MenagerieDatabase, Migration, Migrator, REQUIRED_VERSION,
    UNINITIALIZED, retrieve_version,
};
use rusqlite::Connection;

fn versions(conn: &Connection) -> Vec<i32> {
    let mut stmt = conn
        .prepare("SELECT version FROM version ORDER BY version")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
        [name],
        |row| row.get(0),
    )
    .unwrap()
}

fn noop(_: &Connection) -> rusqlite::Result<()> {
    Ok(())
}

fn step(from: i32, to: i32) -> Migration {
    Migration {
        from,
        to,
        description: "test step",
        run: noop,
    }
}

#[test]
fn fresh_store_migrates_to_required_version() {
    let db = MenagerieDatabase::open_memory().unwrap();
    assert_eq!(db.version().unwrap(), UNINITIALIZED);
    assert!(db.needs_migration().unwrap());
    assert!(db.can_migrate().unwrap());

    assert_eq!(db.migrate().unwrap(), REQUIRED_VERSION);
    assert_eq!(db.version().unwrap(), 10);
    assert!(!db.needs_migration().unwrap());

    let conn = db.connection().unwrap();
    assert_eq!(versions(&conn), vec![8, 9, 10]);
}

#[test]
fn migrated_schema_has_all_tables() {
    let db = MenagerieDatabase::open_memory().unwrap();
    db.migrate().unwrap();
    let conn = db.connection().unwrap();
    for table in [
        "items",
        "tags",
        "tag_notes",
        "tagged",
        "files",
        "images",
        "groups",
        "non_dupes",
        "similar",
        "version",
    ] {
        assert!(table_exists(&conn, table), "missing table {table}");
    }
    assert!(!table_exists(&conn, "media"));
}

#[test]
fn version_ten_is_timestamped() {
    let db = MenagerieDatabase::open_memory().unwrap();
    db.migrate().unwrap();
    let conn = db.connection().unwrap();
    let time: Option<String> = conn
        .query_row("SELECT time FROM version WHERE version = 10", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert!(time.is_some());
}

#[test]
fn migrating_twice_is_a_no_op() {
    let db = MenagerieDatabase::open_memory().unwrap();
    db.migrate().unwrap();
    assert_eq!(db.migrate().unwrap(), 10);
    assert_eq!(versions(&db.connection().unwrap()), vec![8, 9, 10]);
}

#[test]
fn empty_version_table_counts_as_uninitialized() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE version (version INTEGER NOT NULL PRIMARY KEY);")
        .unwrap();
    assert_eq!(retrieve_version(&conn).unwrap(), UNINITIALIZED);
}

#[test]
fn legacy_store_cannot_migrate_but_can_reinitialize() {
    let db = MenagerieDatabase::open_memory().unwrap();
    db.connection()
        .unwrap()
        .execute_batch("CREATE TABLE imgs (id INTEGER PRIMARY KEY, path TEXT);")
        .unwrap();

    assert_eq!(db.version().unwrap(), LEGACY);
    assert!(db.needs_migration().unwrap());
    assert!(!db.can_migrate().unwrap());
    assert!(matches!(
        db.migrate(),
        Err(DatabaseError::BelowMinimumVersion {
            version: 0,
            minimum: 8
        })
    ));

    assert_eq!(db.reinitialize().unwrap(), 10);
    let conn = db.connection().unwrap();
    assert!(!table_exists(&conn, "imgs"));
    assert_eq!(retrieve_version(&conn).unwrap(), 10);
}

#[test]
fn best_migration_skips_ahead_without_overshooting() {
    let mut migrator = Migrator::new(8, 10);
    migrator.register(step(8, 9));
    migrator.register(step(8, 10));
    migrator.register(step(8, 11));
    assert_eq!(migrator.best_for(8).unwrap().to, 10);
    assert!(migrator.best_for(9).is_none());
    assert!(migrator.can_migrate(8));
    assert!(!migrator.can_migrate(9));
}

#[test]
fn cyclic_chain_is_not_migratable() {
    let mut migrator = Migrator::new(8, 10);
    migrator.register(step(8, 9));
    migrator.register(step(9, 8));
    assert!(!migrator.can_migrate(8));

    let mut conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        migrator.migrate(&mut conn, 8),
        Err(DatabaseError::NoMigrationPath { from: 8, to: 10 })
    ));
}

#[test]
fn gap_in_chain_is_not_migratable() {
    let mut migrator = Migrator::new(8, 10);
    migrator.register(step(UNINITIALIZED, 8));
    assert!(!migrator.can_migrate(UNINITIALIZED));
    assert!(migrator.can_migrate(10));
}

#[test]
fn failing_step_rolls_back() {
    fn create_then_fail(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch("CREATE TABLE version (version INTEGER NOT NULL PRIMARY KEY);")?;
        conn.execute_batch("CREATE TABLE half_done (id INTEGER);")?;
        conn.execute_batch("THIS IS NOT SQL;")
    }

    let mut migrator = Migrator::new(8, 8);
    migrator.register(Migration {
        from: UNINITIALIZED,
        to: 8,
        description: "broken",
        run: create_then_fail,
    });

    let mut conn = Connection::open_in_memory().unwrap();
    let err = migrator.migrate(&mut conn, UNINITIALIZED).unwrap_err();
    assert!(matches!(err, DatabaseError::Migration { from: -1, to: 8, .. }));
    assert!(!table_exists(&conn, "half_done"));
    assert_eq!(retrieve_version(&conn).unwrap(), UNINITIALIZED);
}

#[test]
fn v8_media_is_split_into_files_and_images() {
    let mut v8 = Migrator::new(8, 8);
    for migration in Migrator::standard().migrations() {
        if migration.to == 8 {
            v8.register(*migration);
        }
    }
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    assert_eq!(v8.migrate(&mut conn, UNINITIALIZED).unwrap(), 8);

    let hist = vec![7u8; 256];
    conn.execute_batch(
        "INSERT INTO items (id, added) VALUES (1, 10), (2, 20), (3, 30), (4, 40);
         INSERT INTO groups (id, title) VALUES (4, 'comic');",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO media (id, gid, page, path, md5, hist_a, hist_r, hist_g, hist_b, no_similar)
         VALUES (1, 4, 1, '/pics/A.PNG', 'aaa', ?1, ?1, ?1, ?1, 1)",
        [&hist],
    )
    .unwrap();
    conn.execute_batch(
        "INSERT INTO media (id, gid, page, path, md5) VALUES (2, 4, 0, '/docs/b.txt', 'bbb');
         INSERT INTO media (id, path, md5) VALUES (3, '/vids/c.mp4', 'ccc');",
    )
    .unwrap();

    assert_eq!(Migrator::standard().migrate(&mut conn, 8).unwrap(), 10);

    let items: String = conn
        .query_row("SELECT items FROM groups WHERE id = 4", [], |row| row.get(0))
        .unwrap();
    assert_eq!(items, "2,1");

    let files: i64 = conn
        .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .unwrap();
    assert_eq!(files, 3);

    let (id, no_similar, hist_r): (i64, bool, Vec<u8>) = conn
        .query_row("SELECT id, no_similar, hist_r FROM images", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();
    assert_eq!((id, no_similar), (1, true));
    assert_eq!(hist_r, hist);
    assert!(!table_exists(&conn, "media"));
    assert_eq!(versions(&conn), vec![8, 9, 10]);
}
