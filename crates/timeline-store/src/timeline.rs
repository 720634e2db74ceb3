//! Keeps the three denormalized copies of an entry in sync.
//!
//! | Location                 | Keyed by   |
//! |--------------------------|------------|
//! | `years/{entryId}`        | entry id   |
//! | `userEntries/{userId}`   | user id    |
//! | `users/{userId}/entries` | user id    |
//!
//! Every mutating operation builds one [`WriteBatch`].  In
//! [`ConsistencyMode::Atomic`] the batch is committed in a single
//! transaction.  [`ConsistencyMode::Independent`] issues the ops as separate
//! requests the way older clients did: writes stop at the first failure,
//! deletions are all attempted, and nothing that succeeded is rolled back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use timeline_shared::{EntryId, StorePath, UserId, Year};

use crate::error::{Result, StoreError};
use crate::keyed::{KeyedStore, WriteBatch, WriteOp};
use crate::models::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyMode {
    #[default]
    Atomic,
    Independent,
}

impl FromStr for ConsistencyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "independent" => Ok(Self::Independent),
            other => Err(format!("unknown write mode: {other}")),
        }
    }
}

impl fmt::Display for ConsistencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic => f.write_str("atomic"),
            Self::Independent => f.write_str("independent"),
        }
    }
}

/// Result of a user's create-or-update submission.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub entry_id: EntryId,
    /// `false` when an existing `years` row was overwritten.
    pub created: bool,
    /// Surplus `years` rows for the same user that were removed.
    pub repaired: Vec<EntryId>,
    pub entry: Entry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The row had no owner; only `years` was touched.
    YearsOnly,
    /// Every existing copy of a user's entry was removed.
    AllCollections {
        user_id: UserId,
        removed: Vec<StorePath>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeOutcome {
    pub user_id: UserId,
    /// Number of `years` rows that referenced the user.
    pub entries_removed: usize,
    pub removed: Vec<StorePath>,
}

/// The entry synchronizer.  Owns its store.
pub struct Timeline<S> {
    store: S,
    mode: ConsistencyMode,
}

impl<S: KeyedStore> Timeline<S> {
    pub fn new(store: S, mode: ConsistencyMode) -> Self {
        Self { store, mode }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Create or replace `user`'s single entry in all three locations.
    pub fn submit_entry(
        &self,
        user: &UserId,
        user_name: &str,
        year: Year,
        description: &str,
    ) -> Result<WriteOutcome> {
        validate(&year, description)?;
        let now = Utc::now();

        let mut owned = self.years_owned_by(user)?;
        // Most recent first; rows without a timestamp go last.
        owned.sort_by(|(_, a), (_, b)| b.cmp(a));

        let mut rows = owned.into_iter().map(|(id, _)| id);
        let (entry_id, created) = match rows.next() {
            Some(id) => (id, false),
            None => (self.mint_entry_id(now)?, true),
        };
        let repaired: Vec<EntryId> = rows.collect();

        let personal = Entry {
            year,
            description: description.to_string(),
            user_name: Some(user_name.to_string()),
            user_id: None,
            timestamp: Some(now),
        };
        let indexed = Entry {
            user_id: Some(user.clone()),
            ..personal.clone()
        };

        let mut batch = WriteBatch::new();
        batch
            .set(StorePath::personal_entry(user)?, serde_json::to_value(&personal)?)
            .set(StorePath::user_entry(user)?, serde_json::to_value(&indexed)?)
            .set(StorePath::year_entry(&entry_id)?, serde_json::to_value(&indexed)?);
        for extra in &repaired {
            warn!(user = %user, entry = %extra, "removing duplicate years row");
            batch.delete(StorePath::year_entry(extra)?);
        }

        self.commit_in_order(&batch)?;

        info!(
            user = %user,
            entry = %entry_id,
            created,
            mode = %self.mode,
            "entry saved"
        );

        Ok(WriteOutcome {
            entry_id,
            created,
            repaired,
            entry: indexed,
        })
    }

    /// The signed-in user's own copy, if any.
    pub fn personal_entry(&self, user: &UserId) -> Result<Option<Entry>> {
        self.store
            .read(&StorePath::personal_entry(user)?)?
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .transpose()
    }

    /// Admin-authored row with no owner.
    pub fn add_entry(&self, author: &str, year: Year, description: &str) -> Result<(EntryId, Entry)> {
        validate(&year, description)?;
        let now = Utc::now();
        let id = self.mint_entry_id(now)?;

        let entry = Entry {
            year,
            description: description.to_string(),
            user_name: Some(author.to_string()),
            user_id: None,
            timestamp: Some(now),
        };
        self.store
            .write(&StorePath::year_entry(&id)?, &serde_json::to_value(&entry)?)?;

        info!(entry = %id, author, "entry added");
        Ok((id, entry))
    }

    /// Change the year and/or description of `years/{id}`.  Author and owner
    /// are preserved, and the owner's other copies follow the edit.
    pub fn edit_entry(&self, id: &EntryId, year: Option<Year>, description: &str) -> Result<Entry> {
        let path = StorePath::year_entry(id)?;
        let current = self.store.read(&path)?.ok_or(StoreError::NotFound)?;
        let mut entry: Entry = serde_json::from_value(current)?;

        // A stored non-numeric year stays editable; only a new one is checked.
        if let Some(year) = year {
            validate_year(&year)?;
            entry.year = year;
        }
        validate_description(description)?;
        entry.description = description.to_string();
        entry.timestamp = Some(Utc::now());

        let mut batch = WriteBatch::new();
        batch.set(path, serde_json::to_value(&entry)?);

        if let Some(owner) = &entry.user_id {
            let index_path = StorePath::user_entry(owner)?;
            if self.store.exists(&index_path)? {
                batch.set(index_path, serde_json::to_value(&entry)?);
            }
            let personal_path = StorePath::personal_entry(owner)?;
            if self.store.exists(&personal_path)? {
                let personal = Entry {
                    user_id: None,
                    ..entry.clone()
                };
                batch.set(personal_path, serde_json::to_value(&personal)?);
            }
        }

        self.commit_in_order(&batch)?;
        info!(entry = %id, linked = entry.user_id.is_some(), "entry edited");
        Ok(entry)
    }

    // ------------------------------------------------------------------
    // Delete paths
    // ------------------------------------------------------------------

    /// Remove `years/{id}` and every linked copy of it.
    pub fn delete_entry(&self, id: &EntryId) -> Result<DeleteOutcome> {
        let path = StorePath::year_entry(id)?;
        let row = self.store.read(&path)?.ok_or(StoreError::NotFound)?;

        let Some(owner) = owner_of(&row) else {
            self.store.delete(&path)?;
            info!(entry = %id, "unlinked entry deleted");
            return Ok(DeleteOutcome::YearsOnly);
        };

        let mut batch = WriteBatch::new();
        batch.delete(path);
        for linked in [StorePath::user_entry(&owner)?, StorePath::personal_entry(&owner)?] {
            if self.store.exists(&linked)? {
                batch.delete(linked);
            }
        }

        self.commit_all(&batch)?;

        let removed: Vec<StorePath> = batch.paths().cloned().collect();
        info!(entry = %id, user = %owner, copies = removed.len(), "entry deleted");
        Ok(DeleteOutcome::AllCollections {
            user_id: owner,
            removed,
        })
    }

    /// Remove every record that belongs to `user`.
    pub fn delete_user(&self, user: &UserId) -> Result<CascadeOutcome> {
        let owned = self.store.query_by_field(
            &StorePath::years(),
            "userId",
            Some(&json!(user.as_str())),
        )?;

        let mut batch = WriteBatch::new();
        for (key, _) in &owned {
            batch.delete(StorePath::years().child(key)?);
        }
        batch
            .delete(StorePath::user_entry(user)?)
            .delete(StorePath::personal_entry(user)?)
            .delete(StorePath::user_profile(user)?);

        self.commit_all(&batch)?;

        info!(user = %user, entries = owned.len(), "user data deleted");
        Ok(CascadeOutcome {
            user_id: user.clone(),
            entries_removed: owned.len(),
            removed: batch.paths().cloned().collect(),
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn years_owned_by(&self, user: &UserId) -> Result<Vec<(EntryId, Option<DateTime<Utc>>)>> {
        let rows = self.store.query_by_field(
            &StorePath::years(),
            "userId",
            Some(&json!(user.as_str())),
        )?;
        Ok(rows
            .into_iter()
            .map(|(key, value)| {
                let ts = serde_json::from_value::<Entry>(value)
                    .ok()
                    .and_then(|e| e.timestamp);
                (EntryId(key), ts)
            })
            .collect())
    }

    /// A fresh `years` key from `now` in milliseconds, bumped past any key
    /// that is already taken.
    fn mint_entry_id(&self, now: DateTime<Utc>) -> Result<EntryId> {
        let mut millis = now.timestamp_millis();
        loop {
            let id = EntryId::from_millis(millis);
            if !self.store.exists(&StorePath::year_entry(&id)?)? {
                return Ok(id);
            }
            millis += 1;
        }
    }

    /// Commit writes.  Independent mode stops at the first failing op.
    fn commit_in_order(&self, batch: &WriteBatch) -> Result<()> {
        match self.mode {
            ConsistencyMode::Atomic => self.store.apply(batch),
            ConsistencyMode::Independent => {
                for op in batch.ops() {
                    self.run_op(op).map_err(|e| partial(op, e))?;
                }
                Ok(())
            }
        }
    }

    /// Commit deletions.  Independent mode attempts every op and reports
    /// the first failure.
    fn commit_all(&self, batch: &WriteBatch) -> Result<()> {
        match self.mode {
            ConsistencyMode::Atomic => self.store.apply(batch),
            ConsistencyMode::Independent => {
                let mut first_error = None;
                for op in batch.ops() {
                    if let Err(e) = self.run_op(op) {
                        warn!(path = %op.path(), error = %e, "step failed");
                        first_error.get_or_insert_with(|| partial(op, e));
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
        }
    }

    fn run_op(&self, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::Set { path, value } => self.store.write(path, value),
            WriteOp::Delete { path } => self.store.delete(path).map(|_| ()),
        }
    }
}

fn partial(op: &WriteOp, source: StoreError) -> StoreError {
    StoreError::PartialWrite {
        path: op.path().clone(),
        source: Box::new(source),
    }
}

fn owner_of(row: &Value) -> Option<UserId> {
    row.get("userId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(UserId::from)
}

fn validate(year: &Year, description: &str) -> Result<()> {
    validate_year(year)?;
    validate_description(description)
}

fn validate_year(year: &Year) -> Result<()> {
    if !year.is_numeric() {
        return Err(StoreError::InvalidYear(year.label()));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(StoreError::Validation("Description must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::testing::FlakyStore;

    fn timeline() -> Timeline<Database> {
        Timeline::new(Database::open_in_memory().unwrap(), ConsistencyMode::Atomic)
    }

    fn read_entry<S: KeyedStore>(store: &S, path: StorePath) -> Option<Entry> {
        store
            .read(&path)
            .unwrap()
            .map(|v| serde_json::from_value(v).unwrap())
    }

    fn all_copies<S: KeyedStore>(store: &S, user: &UserId, id: &EntryId) -> [Option<Entry>; 3] {
        [
            read_entry(store, StorePath::year_entry(id).unwrap()),
            read_entry(store, StorePath::user_entry(user).unwrap()),
            read_entry(store, StorePath::personal_entry(user).unwrap()),
        ]
    }

    #[test]
    fn test_submit_writes_three_consistent_copies() {
        let tl = timeline();
        let user = UserId::from("u1");

        let out = tl.submit_entry(&user, "ann", Year::from("2010"), "<p>hi</p>").unwrap();
        assert!(out.created);

        let [years, index, personal] = all_copies(tl.store(), &user, &out.entry_id);
        let (years, index, personal) = (years.unwrap(), index.unwrap(), personal.unwrap());
        assert!(years.same_content(&index));
        assert!(years.same_content(&personal));
        assert_eq!(years.user_id, Some(user.clone()));
        assert_eq!(index.user_id, Some(user));
        assert_eq!(personal.user_id, None);
    }

    #[test]
    fn test_resubmit_updates_in_place() {
        let tl = timeline();
        let user = UserId::from("u1");

        let first = tl.submit_entry(&user, "ann", Year::from(2010), "first").unwrap();
        let second = tl.submit_entry(&user, "ann", Year::from(2010), "first").unwrap();

        assert!(!second.created);
        assert_eq!(first.entry_id, second.entry_id);
        assert_eq!(tl.store().children(&StorePath::years()).unwrap().len(), 1);
        assert_eq!(tl.store().children(&StorePath::user_entries()).unwrap().len(), 1);

        let personal = tl.personal_entry(&user).unwrap().unwrap();
        let index = read_entry(tl.store(), StorePath::user_entry(&user).unwrap()).unwrap();
        assert!(personal.same_content(&index));
        assert_eq!(personal.description, "first");
    }

    #[test]
    fn test_submit_keeps_most_recent_duplicate_and_removes_others() {
        let tl = timeline();
        let user = UserId::from("u1");
        let store = tl.store();
        store
            .write(
                &StorePath::parse("years/100").unwrap(),
                &json!({"year": 2000, "description": "old", "userName": "ann",
                        "userId": "u1", "timestamp": "2020-01-01T00:00:00Z"}),
            )
            .unwrap();
        store
            .write(
                &StorePath::parse("years/200").unwrap(),
                &json!({"year": 2001, "description": "newer", "userName": "ann",
                        "userId": "u1", "timestamp": "2021-01-01T00:00:00Z"}),
            )
            .unwrap();

        let out = tl.submit_entry(&user, "ann", Year::from(2002), "latest").unwrap();
        assert_eq!(out.entry_id, EntryId::from("200"));
        assert_eq!(out.repaired, vec![EntryId::from("100")]);
        assert!(!store.exists(&StorePath::parse("years/100").unwrap()).unwrap());
    }

    #[test]
    fn test_submit_rejects_non_numeric_year_and_empty_description() {
        let tl = timeline();
        let user = UserId::from("u1");

        assert!(matches!(
            tl.submit_entry(&user, "ann", Year::from("soon"), "d"),
            Err(StoreError::InvalidYear(_))
        ));
        assert!(matches!(
            tl.submit_entry(&user, "ann", Year::from(2000), "   "),
            Err(StoreError::Validation(_))
        ));
        assert!(tl.store().children(&StorePath::years()).unwrap().is_empty());
    }

    #[test]
    fn test_mint_skips_taken_keys() {
        let tl = timeline();
        let now = Utc::now();
        let taken = EntryId::from_millis(now.timestamp_millis());
        tl.store()
            .write(&StorePath::year_entry(&taken).unwrap(), &json!({"year": 1}))
            .unwrap();

        let id = tl.mint_entry_id(now).unwrap();
        assert_eq!(id.millis(), Some(now.timestamp_millis() + 1));
    }

    #[test]
    fn test_independent_write_stops_before_years_on_failure() {
        let user = UserId::from("u1");
        let store = FlakyStore::new(Database::open_in_memory().unwrap());
        store.fail_on_prefix("years");
        let tl = Timeline::new(store, ConsistencyMode::Independent);

        let err = tl.submit_entry(&user, "ann", Year::from(2010), "d").unwrap_err();
        assert!(matches!(err, StoreError::PartialWrite { .. }));

        // The personal copy and the index are ahead of years.
        let store = tl.store();
        assert!(store.exists(&StorePath::personal_entry(&user).unwrap()).unwrap());
        assert!(store.exists(&StorePath::user_entry(&user).unwrap()).unwrap());
        assert!(store.inner().children(&StorePath::years()).unwrap().is_empty());
    }

    #[test]
    fn test_atomic_write_leaves_nothing_on_failure() {
        let user = UserId::from("u1");
        let store = FlakyStore::new(Database::open_in_memory().unwrap());
        store.fail_on_prefix("years");
        let tl = Timeline::new(store, ConsistencyMode::Atomic);

        assert!(tl.submit_entry(&user, "ann", Year::from(2010), "d").is_err());

        let inner = tl.store().inner();
        assert!(!inner.exists(&StorePath::personal_entry(&user).unwrap()).unwrap());
        assert!(!inner.exists(&StorePath::user_entry(&user).unwrap()).unwrap());
    }

    #[test]
    fn test_delete_linked_entry_removes_all_copies() {
        let tl = timeline();
        let user = UserId::from("u42");
        let store = tl.store();
        let id = EntryId::from("1700000000000");
        let row = json!({"year": 2010, "description": "d", "userName": "ann", "userId": "u42"});
        store.write(&StorePath::year_entry(&id).unwrap(), &row).unwrap();
        store.write(&StorePath::user_entry(&user).unwrap(), &row).unwrap();
        store
            .write(
                &StorePath::personal_entry(&user).unwrap(),
                &json!({"year": 2010, "description": "d", "userName": "ann"}),
            )
            .unwrap();

        let outcome = tl.delete_entry(&id).unwrap();
        match outcome {
            DeleteOutcome::AllCollections { user_id, removed } => {
                assert_eq!(user_id, user);
                assert_eq!(removed.len(), 3);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(all_copies(store, &user, &id), [None, None, None]);
    }

    #[test]
    fn test_delete_unlinked_entry_touches_years_only() {
        let tl = timeline();
        let (id, _) = tl.add_entry("admin", Year::from(2005), "founding").unwrap();
        assert_eq!(tl.delete_entry(&id).unwrap(), DeleteOutcome::YearsOnly);
        assert!(matches!(tl.delete_entry(&id), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_delete_only_lists_copies_that_existed() {
        let tl = timeline();
        let id = EntryId::from("5");
        tl.store()
            .write(
                &StorePath::year_entry(&id).unwrap(),
                &json!({"year": 2010, "description": "d", "userId": "gone"}),
            )
            .unwrap();

        match tl.delete_entry(&id).unwrap() {
            DeleteOutcome::AllCollections { removed, .. } => {
                assert_eq!(removed, vec![StorePath::year_entry(&id).unwrap()]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_independent_delete_partial_failure_is_not_rolled_back() {
        let user = UserId::from("u42");
        let store = FlakyStore::new(Database::open_in_memory().unwrap());
        let tl = Timeline::new(store, ConsistencyMode::Independent);
        let out = tl.submit_entry(&user, "ann", Year::from(2010), "d").unwrap();

        tl.store().fail_on_prefix("userEntries");
        let err = tl.delete_entry(&out.entry_id).unwrap_err();
        match err {
            StoreError::PartialWrite { path, .. } => {
                assert_eq!(path, StorePath::user_entry(&user).unwrap());
            }
            other => panic!("unexpected error {other}"),
        }

        let inner = tl.store().inner();
        assert!(inner.children(&StorePath::years()).unwrap().is_empty());
        assert!(inner.exists(&StorePath::user_entry(&user).unwrap()).unwrap());
        // Deletions after the failing step were still attempted.
        assert!(!inner.exists(&StorePath::personal_entry(&user).unwrap()).unwrap());
    }

    #[test]
    fn test_atomic_delete_failure_keeps_every_copy() {
        let user = UserId::from("u42");
        let store = FlakyStore::new(Database::open_in_memory().unwrap());
        let tl = Timeline::new(store, ConsistencyMode::Atomic);
        let out = tl.submit_entry(&user, "ann", Year::from(2010), "d").unwrap();

        tl.store().fail_on_prefix("userEntries");
        assert!(tl.delete_entry(&out.entry_id).is_err());

        let inner = tl.store().inner();
        let [years, index, personal] = all_copies(inner, &user, &out.entry_id);
        assert!(years.is_some() && index.is_some() && personal.is_some());
    }

    #[test]
    fn test_delete_user_cascades_everywhere() {
        let tl = timeline();
        let user = UserId::from("u1");
        let other = UserId::from("u2");
        let store = tl.store();

        store
            .write(
                &StorePath::user_profile(&user).unwrap(),
                &json!({"name": "ann", "role": "user"}),
            )
            .unwrap();
        tl.submit_entry(&user, "ann", Year::from(2010), "mine").unwrap();
        tl.submit_entry(&other, "bob", Year::from(2011), "theirs").unwrap();
        // A stray duplicate from an old race.
        store
            .write(
                &StorePath::parse("years/1").unwrap(),
                &json!({"year": 1990, "description": "dup", "userId": "u1"}),
            )
            .unwrap();

        let outcome = tl.delete_user(&user).unwrap();
        assert_eq!(outcome.entries_removed, 2);

        for (_, value) in store.children(&StorePath::years()).unwrap() {
            assert_ne!(value["userId"], json!("u1"));
        }
        assert!(!store.exists(&StorePath::user_entry(&user).unwrap()).unwrap());
        assert!(!store.exists(&StorePath::personal_entry(&user).unwrap()).unwrap());
        assert!(!store.exists(&StorePath::user_profile(&user).unwrap()).unwrap());
        assert!(store.exists(&StorePath::user_entry(&other).unwrap()).unwrap());
    }

    #[test]
    fn test_edit_preserves_owner_and_propagates() {
        let tl = timeline();
        let user = UserId::from("u1");
        let out = tl.submit_entry(&user, "ann", Year::from(2010), "draft").unwrap();

        let edited = tl
            .edit_entry(&out.entry_id, Some(Year::from(2012)), "final")
            .unwrap();
        assert_eq!(edited.user_name.as_deref(), Some("ann"));
        assert_eq!(edited.user_id, Some(user.clone()));

        let [years, index, personal] = all_copies(tl.store(), &user, &out.entry_id);
        for copy in [years, index, personal] {
            let copy = copy.unwrap();
            assert_eq!(copy.description, "final");
            assert_eq!(copy.year.label(), "2012");
        }
    }

    #[test]
    fn test_edit_unlinked_and_missing() {
        let tl = timeline();
        let (id, _) = tl.add_entry("admin", Year::from(2005), "a").unwrap();
        let edited = tl.edit_entry(&id, None, "b").unwrap();
        assert_eq!(edited.year.label(), "2005");
        assert_eq!(edited.user_name.as_deref(), Some("admin"));
        assert_eq!(tl.store().children(&StorePath::user_entries()).unwrap().len(), 0);

        assert!(matches!(
            tl.edit_entry(&EntryId::from("nope"), None, "b"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_edit_description_of_text_year_row() {
        let tl = timeline();
        let path = StorePath::parse("years/1").unwrap();
        tl.store()
            .write(&path, &json!({"year": "1960s", "description": "a", "userName": "admin"}))
            .unwrap();

        let edited = tl.edit_entry(&EntryId::from("1"), None, "b").unwrap();
        assert_eq!(edited.year.label(), "1960s");
        assert_eq!(edited.description, "b");
        assert_eq!(read_entry(tl.store(), path).unwrap().description, "b");

        // A new year must still be numeric, and the description non-empty.
        assert!(matches!(
            tl.edit_entry(&EntryId::from("1"), Some(Year::from("soon")), "c"),
            Err(StoreError::InvalidYear(_))
        ));
        assert!(matches!(
            tl.edit_entry(&EntryId::from("1"), None, "  "),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_atomic_write_rolls_back_when_sqlite_fails_mid_batch() {
        let user = UserId::from("u1");
        let db = Database::open_in_memory().unwrap();
        // The years row is the last set in the batch; abort there.
        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_years BEFORE INSERT ON nodes
                 WHEN NEW.parent = 'years'
                 BEGIN SELECT RAISE(ABORT, 'boom'); END;",
            )
            .unwrap();
        let tl = Timeline::new(db, ConsistencyMode::Atomic);

        let err = tl.submit_entry(&user, "ann", Year::from(2010), "d").unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)), "{err}");

        let db = tl.store();
        assert!(!db.exists(&StorePath::personal_entry(&user).unwrap()).unwrap());
        assert!(!db.exists(&StorePath::user_entry(&user).unwrap()).unwrap());
        assert!(db.children(&StorePath::years()).unwrap().is_empty());
    }

    #[test]
    fn test_atomic_delete_rolls_back_when_sqlite_fails_mid_batch() {
        let user = UserId::from("u42");
        let tl = timeline();
        let outcome = tl.submit_entry(&user, "u", Year::from(2015), "x").unwrap();
        tl.store()
            .conn()
            .execute_batch(
                "CREATE TRIGGER keep_personal BEFORE DELETE ON nodes
                 WHEN OLD.path = 'users/u42/entries'
                 BEGIN SELECT RAISE(ABORT, 'boom'); END;",
            )
            .unwrap();

        assert!(tl.delete_entry(&outcome.entry_id).is_err());

        // The years row and the index were deleted first inside the batch.
        for copy in all_copies(tl.store(), &user, &outcome.entry_id) {
            assert!(copy.is_some());
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Atomic".parse::<ConsistencyMode>().unwrap(), ConsistencyMode::Atomic);
        assert_eq!(
            "independent".parse::<ConsistencyMode>().unwrap(),
            ConsistencyMode::Independent
        );
        assert!("eventual".parse::<ConsistencyMode>().is_err());
    }
}
