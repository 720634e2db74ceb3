//! # timeline-shared
//!
//! Domain types shared by the store and the HTTP server: identifiers, the
//! permissive [`Year`] label, hierarchical [`StorePath`]s and the error
//! enums surfaced to users.

pub mod constants;
pub mod error;
pub mod paths;
pub mod types;

pub use error::{AuthError, PathError};
pub use paths::StorePath;
pub use types::{EntryId, Role, UserId, Year};
