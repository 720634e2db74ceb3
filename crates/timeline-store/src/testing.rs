//! Fault injection for exercising partial-failure behaviour.

use std::cell::RefCell;

use serde_json::Value;

use timeline_shared::StorePath;

use crate::error::{Result, StoreError};
use crate::keyed::{KeyedStore, WriteBatch};

/// Wraps a store and rejects mutations below configured prefixes.  Reads
/// always pass through.
pub(crate) struct FlakyStore<S> {
    inner: S,
    failing: RefCell<Vec<StorePath>>,
}

impl<S: KeyedStore> FlakyStore<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            failing: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn fail_on_prefix(&self, prefix: &str) {
        let prefix = StorePath::parse(prefix).expect("valid prefix");
        self.failing.borrow_mut().push(prefix);
    }

    pub(crate) fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, path: &StorePath) -> Result<()> {
        let blocked = self
            .failing
            .borrow()
            .iter()
            .any(|p| p == path || p.is_ancestor_of(path));
        if blocked {
            return Err(StoreError::Backend(format!("injected failure at {path}")));
        }
        Ok(())
    }
}

impl<S: KeyedStore> KeyedStore for FlakyStore<S> {
    fn read(&self, path: &StorePath) -> Result<Option<Value>> {
        self.inner.read(path)
    }

    fn write(&self, path: &StorePath, value: &Value) -> Result<()> {
        self.check(path)?;
        self.inner.write(path, value)
    }

    fn delete(&self, path: &StorePath) -> Result<bool> {
        self.check(path)?;
        self.inner.delete(path)
    }

    fn children(&self, collection: &StorePath) -> Result<Vec<(String, Value)>> {
        self.inner.children(collection)
    }

    fn query_by_field(
        &self,
        collection: &StorePath,
        field: &str,
        equals: Option<&Value>,
    ) -> Result<Vec<(String, Value)>> {
        self.inner.query_by_field(collection, field, equals)
    }

    fn apply(&self, batch: &WriteBatch) -> Result<()> {
        for path in batch.paths() {
            self.check(path)?;
        }
        self.inner.apply(batch)
    }
}
