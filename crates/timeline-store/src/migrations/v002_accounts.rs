//! v002 -- Credential records for the authentication service.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    user_id       TEXT PRIMARY KEY NOT NULL,
    name          TEXT NOT NULL UNIQUE,     -- lower-cased login name
    password_hash TEXT NOT NULL,            -- hex-encoded Argon2id output
    salt          TEXT NOT NULL,            -- hex-encoded 16-byte salt
    created_at    TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
