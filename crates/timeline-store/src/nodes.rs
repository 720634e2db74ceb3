//! [`KeyedStore`] implementation over the `nodes` table.

use chrono::Utc;
use rusqlite::{params, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::Value;

use timeline_shared::StorePath;

use crate::database::Database;
use crate::error::Result;
use crate::keyed::{KeyedStore, WriteBatch, WriteOp};

impl KeyedStore for Database {
    fn read(&self, path: &StorePath) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM nodes WHERE path = ?1",
                params![path.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| serde_json::from_str(&s).map_err(Into::into))
            .transpose()
    }

    fn write(&self, path: &StorePath, value: &Value) -> Result<()> {
        put(self.conn(), path, value, &Utc::now().to_rfc3339())
    }

    fn delete(&self, path: &StorePath) -> Result<bool> {
        remove(self.conn(), path)
    }

    fn children(&self, collection: &StorePath) -> Result<Vec<(String, Value)>> {
        let mut stmt = self.conn().prepare(
            "SELECT key, value FROM nodes
             WHERE parent = ?1
             ORDER BY key ASC",
        )?;
        let rows = stmt.query_map(params![collection.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        collect_rows(rows)
    }

    fn query_by_field(
        &self,
        collection: &StorePath,
        field: &str,
        equals: Option<&Value>,
    ) -> Result<Vec<(String, Value)>> {
        let indexed = equals.and_then(sql_scalar).filter(|_| is_plain_field(field));

        let Some(expected) = indexed else {
            // Ordering and non-scalar comparisons happen in Rust.
            let mut rows = self.children(collection)?;
            match equals {
                Some(expected) => rows.retain(|(_, v)| v.get(field) == Some(expected)),
                None => rows.sort_by(|(ka, va), (kb, vb)| {
                    crate::keyed::compare_field(va.get(field), vb.get(field))
                        .then_with(|| ka.cmp(kb))
                }),
            }
            return Ok(rows);
        };

        // Must match the expression of idx_nodes_user_id to use the index.
        let sql = format!(
            "SELECT key, value FROM nodes
             WHERE parent = ?1 AND json_extract(value, '$.{field}') = ?2
             ORDER BY key ASC"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![collection.as_str(), expected], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        collect_rows(rows)
    }

    fn apply(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn().unchecked_transaction()?;
        for op in batch.ops() {
            match op {
                WriteOp::Set { path, value } => put(&tx, path, value, &now)?,
                WriteOp::Delete { path } => {
                    remove(&tx, path)?;
                }
            }
        }
        tx.commit()?;

        tracing::debug!(ops = batch.len(), "applied write batch");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn put(conn: &Connection, path: &StorePath, value: &Value, now: &str) -> Result<()> {
    if value.is_null() {
        remove(conn, path)?;
        return Ok(());
    }

    let parent = path.parent().map(String::from);
    conn.execute(
        "INSERT INTO nodes (path, parent, key, value, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(path) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
        params![
            path.as_str(),
            parent,
            path.key(),
            serde_json::to_string(value)?,
            now,
        ],
    )?;
    Ok(())
}

fn remove(conn: &Connection, path: &StorePath) -> Result<bool> {
    // Descendants are exactly the paths in ["p/", "p0"): '0' follows '/'.
    let lower = format!("{path}/");
    let upper = format!("{path}0");
    let affected = conn.execute(
        "DELETE FROM nodes
         WHERE path = ?1 OR (path >= ?2 AND path < ?3)",
        params![path.as_str(), lower, upper],
    )?;
    Ok(affected > 0)
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<(String, String)>>,
) -> Result<Vec<(String, Value)>> {
    let mut out = Vec::new();
    for row in rows {
        let (key, raw) = row?;
        out.push((key, serde_json::from_str(&raw)?));
    }
    Ok(out)
}

/// SQL value with the same equality semantics as the JSON one.  Booleans are
/// excluded because SQLite stores them as integers.
fn sql_scalar(value: &Value) -> Option<SqlValue> {
    match value {
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real)),
        _ => None,
    }
}

fn is_plain_field(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> StorePath {
        StorePath::parse(s).unwrap()
    }

    #[test]
    fn test_write_read_overwrite() {
        let db = Database::open_in_memory().unwrap();
        let p = path("years/1");

        assert_eq!(db.read(&p).unwrap(), None);
        db.write(&p, &json!({"year": 2010})).unwrap();
        db.write(&p, &json!({"year": 2011})).unwrap();
        assert_eq!(db.read(&p).unwrap(), Some(json!({"year": 2011})));
    }

    #[test]
    fn test_read_is_not_recursive_but_delete_is() {
        let db = Database::open_in_memory().unwrap();
        db.write(&path("users/u1"), &json!({"name": "ann"})).unwrap();
        db.write(&path("users/u1/entries"), &json!({"year": 2000})).unwrap();
        db.write(&path("users/u10"), &json!({"name": "bob"})).unwrap();

        assert_eq!(db.read(&path("users/u1")).unwrap(), Some(json!({"name": "ann"})));

        assert!(db.delete(&path("users/u1")).unwrap());
        assert!(!db.exists(&path("users/u1/entries")).unwrap());
        assert!(db.exists(&path("users/u10")).unwrap());
        assert!(!db.delete(&path("users/u1")).unwrap());
    }

    #[test]
    fn test_writing_null_deletes() {
        let db = Database::open_in_memory().unwrap();
        let p = path("userEntries/u1");
        db.write(&p, &json!({"year": 1})).unwrap();
        db.write(&p, &Value::Null).unwrap();
        assert!(!db.exists(&p).unwrap());
    }

    #[test]
    fn test_children_are_direct_only() {
        let db = Database::open_in_memory().unwrap();
        db.write(&path("users/a"), &json!({"name": "a"})).unwrap();
        db.write(&path("users/a/entries"), &json!({"year": 1})).unwrap();
        db.write(&path("users/b"), &json!({"name": "b"})).unwrap();

        let keys: Vec<String> = db
            .children(&StorePath::users())
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_query_by_field_equals_uses_sql_path() {
        let db = Database::open_in_memory().unwrap();
        db.write(&path("years/1"), &json!({"year": 2001, "userId": "u1"})).unwrap();
        db.write(&path("years/2"), &json!({"year": 2002, "userId": "u2"})).unwrap();
        db.write(&path("years/3"), &json!({"year": 2003})).unwrap();
        db.write(&path("years/4"), &json!({"year": 2004, "userId": "u1"})).unwrap();

        let rows = db
            .query_by_field(&StorePath::years(), "userId", Some(&json!("u1")))
            .unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["1", "4"]);
    }

    #[test]
    fn test_query_by_field_orders_mixed_values() {
        let db = Database::open_in_memory().unwrap();
        db.write(&path("years/a"), &json!({"year": "2020"})).unwrap();
        db.write(&path("years/b"), &json!({"year": 2005})).unwrap();
        db.write(&path("years/c"), &json!({"description": "no year"})).unwrap();
        db.write(&path("years/d"), &json!({"year": 2010})).unwrap();

        let keys: Vec<String> = db
            .query_by_field(&StorePath::years(), "year", None)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_apply_batch_commits_all_ops() {
        let db = Database::open_in_memory().unwrap();
        db.write(&path("years/old"), &json!({"year": 1})).unwrap();

        let mut batch = WriteBatch::new();
        batch
            .set(path("years/new"), json!({"year": 2}))
            .set(path("userEntries/u"), json!({"year": 2}))
            .delete(path("years/old"));
        db.apply(&batch).unwrap();

        assert!(db.exists(&path("years/new")).unwrap());
        assert!(db.exists(&path("userEntries/u")).unwrap());
        assert!(!db.exists(&path("years/old")).unwrap());
    }
}
