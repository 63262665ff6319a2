//! Error types for the abstractu-content library.
//!
//! This module provides custom error types using `thiserror` so that the
//! service and HTTP layers can map failures onto the right response class.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur while storing, publishing or reading content.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Malformed input (bad cid, out-of-range limit, missing field)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Concept does not exist
    #[error("Concept not found: {0}")]
    ConceptNotFound(String),

    /// Draft does not exist or belongs to another author
    #[error("Draft not found: {0}")]
    DraftNotFound(String),

    /// A concept with this cid already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Markdown produced no fragments
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// The store aborted the write transaction; the operation may be retried
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// Stored chain violates contiguity or linkage
    #[error("Chain integrity violation: {0}")]
    Integrity(String),

    /// Caller is not an administrator
    #[error("Unauthorized")]
    Unauthorized,

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with `ChainError`
pub type Result<T> = std::result::Result<T, ChainError>;

impl ChainError {
    /// True when repeating the operation may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionAborted(_))
    }

    /// Short machine-readable label used for metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::ConceptNotFound(_) | Self::DraftNotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Parsing(_) => "parsing",
            Self::TransactionAborted(_) => "transaction_aborted",
            Self::Integrity(_) => "integrity",
            Self::Unauthorized => "unauthorized",
            Self::Database(_) => "database",
            Self::Pool(_) => "pool",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::TransactionAborted(err.to_string())
            },
            _ => Self::Database(err),
        }
    }
}

impl From<anyhow::Error> for ChainError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ChainError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Other(format!("Blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_aborts_are_retryable() {
        assert!(ChainError::TransactionAborted("busy".into()).is_retryable());
        assert!(!ChainError::Conflict("w".into()).is_retryable());
        assert!(!ChainError::Parsing("empty".into()).is_retryable());
    }

    #[test]
    fn test_busy_sqlite_error_maps_to_abort() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        assert!(matches!(ChainError::from(err), ChainError::TransactionAborted(_)));
    }
}
