use thiserror::Error;

use timeline_shared::{PathError, StorePath};

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The referenced record is absent.
    #[error("Record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored or submitted value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// An id could not be turned into a store path.
    #[error("Invalid path: {0}")]
    Path(#[from] PathError),

    /// The year label has no numeric value.
    #[error("Year must be a number, got {0:?}")]
    InvalidYear(String),

    /// Submitted entry content was rejected.
    #[error("{0}")]
    Validation(String),

    /// Failure reported by a non-SQLite backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// One step of a non-atomic multi-path operation failed.  Steps that
    /// already succeeded are not rolled back.
    #[error("Failed at {path}: {source}")]
    PartialWrite {
        path: StorePath,
        #[source]
        source: Box<StoreError>,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
