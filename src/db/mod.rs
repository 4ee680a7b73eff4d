//! Persistent photo storage.
//!
//! One `photos` table keyed by id, with secondary indexes on `created_at` and
//! `expires_at`. The indexes are maintained by SQLite inside the same
//! transaction as the row they describe, so they can never drift from it.

mod schema;
pub mod sqlite;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStore;

/// Where the store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Private in-memory database, gone when the store is dropped.
    Memory,
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::File(path) => write!(f, "{}", path.display()),
            StoreLocation::Memory => f.write_str(":memory:"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open photo store at {location}: {source}")]
    Open {
        location: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("photo store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("photo store schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: i64, supported: i64 },

    #[error("photo store migration to version {version} failed: {source}")]
    Migration {
        version: i64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("photo store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("photo {id} has an out-of-range {field} value {value}")]
    CorruptRecord {
        id: String,
        field: &'static str,
        value: i64,
    },

    #[error("photo store handle poisoned by a panicked operation")]
    Poisoned,

    #[error("photo store task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}
