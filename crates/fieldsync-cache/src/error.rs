//! Error types for the cache module.
//!
//! These never cross the public `read`/`invalidate` surface; they exist so
//! the internal load/store helpers can compose with `?` before the public
//! methods absorb and log them.

use thiserror::Error;

/// Errors that can occur inside cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying key-value store failed.
    #[error("store error: {0}")]
    Store(#[from] fieldsync_store::StoreError),

    /// A persisted entry could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
