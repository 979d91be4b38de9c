//! Local persistence: an explicitly owned SQLite handle, the raw
//! cost-observation repository, and a TTL cache for derived views.
//!
//! The repository is the durable source of truth; the cache is purely
//! an accelerator and its absence never breaks correctness.

pub mod cache;
pub mod history;
mod migrations;
mod store;

pub use history::CostObservation;
pub use store::Store;

use thiserror::Error;

/// Local persistence failure. Fatal for the current operation and
/// surfaced as-is; a cache miss is never one of these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    InvalidArgument(String),
}
