//! Store and cache error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the cache and the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The call did not complete within its bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that was abandoned.
        operation: &'static str,
        /// The bound that elapsed.
        after: Duration,
    },

    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A cached value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Anything else.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl StoreError {
    /// Returns `true` for faults that say nothing about the data itself.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }
}

/// Result type for store and cache operations.
pub type StoreResult<T> = Result<T, StoreError>;
