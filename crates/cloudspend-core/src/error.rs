//! Error taxonomy shared across the workspace.
//!
//! Three failure families matter: configuration problems the user must
//! fix (never retried), remote-source failures propagated unchanged
//! with whatever remediation hint they carry, and local store failures
//! (defined in the store crate). Cache misses are never errors.

use thiserror::Error;

/// Setup is incomplete or the config file is unusable.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConfigError {
    pub message: String,
    pub hint: Option<String>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: Some("run: cloudspend init".to_string()),
        }
    }

    pub fn with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

/// A remote cost-source query failed. Not retried by the engine; any
/// retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("authentication failed: {message}")]
    Auth {
        message: String,
        hint: Option<String>,
    },
    #[error("permission denied: {message}")]
    Permission {
        message: String,
        hint: Option<String>,
    },
    #[error("query failed: {message}")]
    Query {
        message: String,
        hint: Option<String>,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl SourceError {
    pub fn hint(&self) -> Option<&str> {
        match self {
            SourceError::Auth { hint, .. }
            | SourceError::Permission { hint, .. }
            | SourceError::Query { hint, .. } => hint.as_deref(),
            SourceError::InvalidInput { .. } => None,
        }
    }
}
