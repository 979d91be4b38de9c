//! Aggregation engine: decides what to fetch, persists raw rows, and
//! derives trend/forecast/budget signals behind the TTL cache.

pub mod aggregate;
pub mod bigquery;
pub mod resolve;
pub mod source;

pub use aggregate::{breakdown, cost_status, history};
pub use bigquery::BigQuerySource;
pub use resolve::{resolve_table, TableResolution};
pub use source::RemoteCostSource;

use cloudspend_core::error::{ConfigError, SourceError};
use cloudspend_store::StoreError;
use thiserror::Error;

/// Engine failure: configuration, remote source, or local store.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Remediation hint to show the user, when the failure carries one.
    pub fn hint(&self) -> Option<&str> {
        match self {
            EngineError::Config(err) => err.hint.as_deref(),
            EngineError::Source(err) => err.hint(),
            EngineError::Store(_) => None,
        }
    }
}
