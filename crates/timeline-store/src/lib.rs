//! # timeline-store
//!
//! Persistence for the faculty history timeline, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle implementing the
//! hierarchical [`KeyedStore`] interface, and the [`Timeline`] synchronizer
//! that keeps the `years`, `userEntries` and `users/{uid}/entries` copies of
//! every entry consistent.

pub mod accounts;
pub mod database;
pub mod keyed;
pub mod listing;
pub mod migrations;
pub mod models;
pub mod nodes;
pub mod profiles;
pub mod timeline;

mod error;

#[cfg(test)]
mod testing;

pub use database::Database;
pub use error::{Result, StoreError};
pub use keyed::{KeyedStore, WriteBatch, WriteOp};
pub use listing::{merge_listing, ListedEntry, Source};
pub use models::*;
pub use timeline::{CascadeOutcome, ConsistencyMode, DeleteOutcome, Timeline, WriteOutcome};
