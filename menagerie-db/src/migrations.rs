//! The built-in migration chain.

use rusqlite::{Connection, params};

use menagerie_core::item::IMAGE_EXTENSIONS;

use crate::migration::{MINIMUM_VERSION, Migration, UNINITIALIZED};

pub(crate) fn builtin() -> Vec<Migration> {
    vec![
        Migration {
            from: UNINITIALIZED,
            to: MINIMUM_VERSION,
            description: "initialize v8 schema",
            run: initialize_v8,
        },
        Migration {
            from: 8,
            to: 9,
            description: "split media into files and images, order group items",
            run: migrate_8_to_9,
        },
        Migration {
            from: 9,
            to: 10,
            description: "add similar pairs, timestamp versions",
            run: migrate_9_to_10,
        },
    ]
}

/// Every table any version of the schema has used, children before parents.
const KNOWN_TABLES: &[&str] = &[
    "tag_notes",
    "tagged",
    "non_dupes",
    "similar",
    "media",
    "images",
    "files",
    "groups",
    "imgs",
    "items",
    "tags",
    "version",
];

const SCHEMA_V8_SQL: &str = r#"
CREATE TABLE tags (
    id      INTEGER PRIMARY KEY,
    name    TEXT NOT NULL UNIQUE,
    color   TEXT
);

CREATE TABLE tag_notes (
    tag_id  INTEGER REFERENCES tags(id) ON DELETE CASCADE,
    note    TEXT
);

CREATE TABLE items (
    id      INTEGER PRIMARY KEY,
    added   INTEGER NOT NULL
);

CREATE TABLE tagged (
    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    tag_id  INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (item_id, tag_id)
);

CREATE TABLE groups (
    id      INTEGER NOT NULL PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
    title   TEXT
);

CREATE TABLE media (
    id          INTEGER NOT NULL PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
    gid         INTEGER REFERENCES groups(id) ON DELETE SET NULL,
    page        INTEGER NOT NULL DEFAULT 0,
    path        TEXT UNIQUE,
    md5         TEXT,
    hist_a      BLOB,
    hist_r      BLOB,
    hist_g      BLOB,
    hist_b      BLOB,
    no_similar  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE non_dupes (
    item_1  INTEGER REFERENCES items(id) ON DELETE CASCADE,
    item_2  INTEGER REFERENCES items(id) ON DELETE CASCADE
);

CREATE TABLE version (
    version INTEGER NOT NULL PRIMARY KEY
);
"#;

fn initialize_v8(conn: &Connection) -> rusqlite::Result<()> {
    for table in KNOWN_TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
    }
    conn.execute_batch(SCHEMA_V8_SQL)
}

fn migrate_8_to_9(conn: &Connection) -> rusqlite::Result<()> {
    // Group children move from media.gid/page onto an ordered id list.
    conn.execute_batch("ALTER TABLE groups ADD COLUMN items TEXT DEFAULT NULL;")?;
    let groups: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM groups")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    {
        let mut children = conn.prepare("SELECT id FROM media WHERE gid = ?1 ORDER BY page, id")?;
        let mut update = conn.prepare("UPDATE groups SET items = ?1 WHERE id = ?2")?;
        for gid in groups {
            let ids = children
                .query_map([gid], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            let csv = ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            update.execute(params![csv, gid])?;
        }
    }

    conn.execute_batch(
        "CREATE TABLE files (
            id      INTEGER NOT NULL PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
            md5     TEXT,
            file    TEXT UNIQUE
        );
        INSERT INTO files (id, md5, file) SELECT id, md5, path FROM media;

        CREATE TABLE images (
            id          INTEGER NOT NULL PRIMARY KEY REFERENCES items(id) ON DELETE CASCADE,
            no_similar  INTEGER NOT NULL DEFAULT 0,
            hist_a      BLOB,
            hist_r      BLOB,
            hist_g      BLOB,
            hist_b      BLOB
        );",
    )?;

    // Only media rows with an image extension keep their image payload.
    let is_image = IMAGE_EXTENSIONS
        .iter()
        .map(|ext| format!("LOWER(path) LIKE '%.{ext}'"))
        .collect::<Vec<_>>()
        .join(" OR ");
    conn.execute_batch(&format!(
        "INSERT INTO images (id, no_similar, hist_a, hist_r, hist_g, hist_b)
            SELECT id, no_similar, hist_a, hist_r, hist_g, hist_b FROM media WHERE {is_image};
        DROP TABLE media;"
    ))
}

fn migrate_9_to_10(conn: &Connection) -> rusqlite::Result<()> {
    // SQLite cannot add a column with a non-constant default, so the
    // version table is rebuilt.
    conn.execute_batch(
        "CREATE TABLE similar (
            id1         INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            id2         INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            similarity  REAL NOT NULL
        );

        CREATE TABLE version_new (
            version INTEGER NOT NULL PRIMARY KEY,
            time    TEXT DEFAULT CURRENT_TIMESTAMP
        );
        INSERT INTO version_new (version, time) SELECT version, NULL FROM version;
        DROP TABLE version;
        ALTER TABLE version_new RENAME TO version;",
    )
}
