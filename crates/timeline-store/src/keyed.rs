//! The keyed-store abstraction the synchronizer is written against.
//!
//! Values are JSON documents addressed by [`StorePath`].  Reads are
//! non-recursive (a node's own value only); deletes remove the node and
//! everything below it.

use std::cmp::Ordering;

use serde_json::Value;

use timeline_shared::StorePath;

use crate::error::Result;

/// One step of a multi-path write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { path: StorePath, value: Value },
    Delete { path: StorePath },
}

impl WriteOp {
    pub fn path(&self) -> &StorePath {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Delete { path } => path,
        }
    }
}

/// An ordered set of writes that [`KeyedStore::apply`] commits atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: StorePath, value: Value) -> &mut Self {
        self.ops.push(WriteOp::Set { path, value });
        self
    }

    pub fn delete(&mut self, path: StorePath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn paths(&self) -> impl Iterator<Item = &StorePath> {
        self.ops.iter().map(WriteOp::path)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

pub trait KeyedStore {
    /// Value stored at exactly `path`.
    fn read(&self, path: &StorePath) -> Result<Option<Value>>;

    /// Overwrite the value at `path`.  Writing `null` deletes the node.
    fn write(&self, path: &StorePath, value: &Value) -> Result<()>;

    /// Remove `path` and all of its descendants.  Returns `true` if anything
    /// was removed.
    fn delete(&self, path: &StorePath) -> Result<bool>;

    /// Direct children of `collection` as `(key, value)`, ordered by key.
    fn children(&self, collection: &StorePath) -> Result<Vec<(String, Value)>>;

    /// Direct children of `collection` whose `field` equals `equals`, or all
    /// children ordered by `field` when `equals` is `None`.
    fn query_by_field(
        &self,
        collection: &StorePath,
        field: &str,
        equals: Option<&Value>,
    ) -> Result<Vec<(String, Value)>> {
        let mut rows = self.children(collection)?;
        match equals {
            Some(expected) => rows.retain(|(_, value)| value.get(field) == Some(expected)),
            None => rows.sort_by(|(ka, va), (kb, vb)| {
                compare_field(va.get(field), vb.get(field)).then_with(|| ka.cmp(kb))
            }),
        }
        Ok(rows)
    }

    /// Commit every op in `batch` or none of them.
    fn apply(&self, batch: &WriteBatch) -> Result<()>;

    fn exists(&self, path: &StorePath) -> Result<bool> {
        Ok(self.read(path)?.is_some())
    }
}

/// Ordering of child values: missing/null, false, true, numbers, strings,
/// then objects and arrays.
pub(crate) fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(false)) => 1,
            Some(Value::Bool(true)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_field_ranks() {
        let mut values = vec![
            Some(json!("b")),
            Some(json!(10)),
            None,
            Some(json!(true)),
            Some(json!(2)),
            Some(json!("a")),
        ];
        values.sort_by(|a, b| compare_field(a.as_ref(), b.as_ref()));
        assert_eq!(
            values,
            vec![
                None,
                Some(json!(true)),
                Some(json!(2)),
                Some(json!(10)),
                Some(json!("a")),
                Some(json!("b")),
            ]
        );
    }

    #[test]
    fn test_batch_records_paths_in_order() {
        let mut batch = WriteBatch::new();
        batch
            .set(StorePath::parse("a/1").unwrap(), json!(1))
            .delete(StorePath::parse("b/2").unwrap());
        let paths: Vec<&str> = batch.paths().map(StorePath::as_str).collect();
        assert_eq!(paths, vec!["a/1", "b/2"]);
        assert_eq!(batch.len(), 2);
    }
}
