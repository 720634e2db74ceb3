//! Read side: the public timeline and the admin listing.

use std::collections::hash_map::Entry as Slot;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use timeline_shared::{StorePath, UserId};

use crate::error::Result;
use crate::keyed::KeyedStore;
use crate::models::Entry;
use crate::timeline::Timeline;

/// Which collection a listed row was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    Years,
    UserEntries,
}

/// A row ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedEntry {
    pub id: String,
    pub source: Source,
    #[serde(flatten)]
    pub entry: Entry,
}

/// Identity used to decide that two rows show the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Owner(UserId),
    /// `year-userName`, only for rows written without an owner.
    Legacy(String),
}

impl ListedEntry {
    fn dedup_key(&self) -> DedupKey {
        match &self.entry.user_id {
            Some(owner) => DedupKey::Owner(owner.clone()),
            None => DedupKey::Legacy(format!(
                "{}-{}",
                self.entry.year.label(),
                self.entry.user_name.as_deref().unwrap_or_default()
            )),
        }
    }

    fn is_displayable(&self) -> bool {
        !self.entry.year.is_blank() && !self.entry.description.is_empty()
    }
}

/// Merge `years` and `userEntries` into one de-duplicated list, newest
/// year first.
///
/// `years` wins over `userEntries`.  Inside one collection the row with the
/// latest timestamp wins.
pub fn merge_listing(years: Vec<ListedEntry>, user_entries: Vec<ListedEntry>) -> Vec<ListedEntry> {
    let mut merged: Vec<ListedEntry> = Vec::with_capacity(years.len() + user_entries.len());
    let mut seen: HashMap<DedupKey, usize> = HashMap::new();

    let user_entries = user_entries.into_iter().filter(ListedEntry::is_displayable);

    for row in years.into_iter().chain(user_entries) {
        match seen.entry(row.dedup_key()) {
            Slot::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(row);
            }
            Slot::Occupied(slot) => {
                let kept = &mut merged[*slot.get()];
                if kept.source == row.source && row.entry.timestamp > kept.entry.timestamp {
                    *kept = row;
                }
            }
        }
    }

    sort_descending(&mut merged);
    merged
}

/// Stable sort by year, newest first.  Non-numeric years go last.
pub fn sort_descending(entries: &mut [ListedEntry]) {
    entries.sort_by(|a, b| a.entry.year.cmp_descending(&b.entry.year));
}

impl<S: KeyedStore> Timeline<S> {
    /// The public timeline: `years` merged with `userEntries`.
    pub fn merged_listing(&self) -> Result<Vec<ListedEntry>> {
        let years = self.load(&StorePath::years(), Source::Years)?;
        let user_entries = self.load(&StorePath::user_entries(), Source::UserEntries)?;
        Ok(merge_listing(years, user_entries))
    }

    /// Every `years` row, newest year first, duplicates included.
    pub fn years_listing(&self) -> Result<Vec<ListedEntry>> {
        let mut rows = self.load(&StorePath::years(), Source::Years)?;
        sort_descending(&mut rows);
        Ok(rows)
    }

    fn load(&self, collection: &StorePath, source: Source) -> Result<Vec<ListedEntry>> {
        let rows = self.store().query_by_field(collection, "year", None)?;
        let mut out = Vec::with_capacity(rows.len());
        for (id, value) in rows {
            match serde_json::from_value::<Entry>(value) {
                Ok(entry) => out.push(ListedEntry { id, source, entry }),
                Err(e) => {
                    tracing::warn!(collection = %collection, id = %id, error = %e, "skipping unreadable row");
                }
            }
        }
        Ok(out)
    }
}
