//! v001 -- Keyed node table.
//!
//! Every value in the hierarchical store is one row keyed by its full path.
//! `parent` is NULL for top-level nodes and lets a collection's children be
//! listed without a prefix scan.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    path       TEXT PRIMARY KEY NOT NULL,   -- e.g. 'users/abc/entries'
    parent     TEXT,                        -- e.g. 'users/abc'
    key        TEXT NOT NULL,               -- last path segment
    value      TEXT NOT NULL,               -- JSON document
    updated_at TEXT NOT NULL                -- RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent, key);

-- Ownership lookups on the years collection.
CREATE INDEX IF NOT EXISTS idx_nodes_user_id
    ON nodes(parent, json_extract(value, '$.userId'));
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
