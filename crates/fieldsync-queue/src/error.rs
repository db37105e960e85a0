//! Error types for the queue module.

use thiserror::Error;

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Underlying key-value store failed.
    #[error("store error: {0}")]
    Store(#[from] fieldsync_store::StoreError),

    /// The persisted queue array could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No queued mutation with this id.
    #[error("mutation not found: {0}")]
    NotFound(String),

    /// The mutation exists but is not dead-lettered, so it cannot be
    /// retried or discarded by hand; it will drain normally.
    #[error("mutation not dead-lettered: {0}")]
    NotDeadLettered(String),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
