//! Error types for the portal surface.

use thiserror::Error;

use fieldsync_queue::QueueError;
use fieldsync_store::StoreError;

/// Errors that can occur during portal operations.
///
/// Only local failures surface here. Remote failures never do: reads
/// degrade to cached or empty results, and write failures are reported
/// through queue events and dead-letter status instead.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Queue error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for portal operations.
pub type Result<T> = std::result::Result<T, PortalError>;
