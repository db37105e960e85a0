//! Queue lifecycle events emitted by the drain.
//!
//! The umbrella client listens for `Applied` to resolve temp ids and for
//! `DeadLettered` to surface needs-attention UI. Events are broadcast;
//! missing one is recoverable since the queue itself is the source of
//! truth.

/// Something happened to a queued mutation during a drain.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// The remote store confirmed the mutation.
    Applied {
        mutation_id: String,
        resource: String,
        /// Client-assigned temp id from the payload, when present.
        temp_id: Option<String>,
        /// Authoritative record returned by the remote store.
        record: serde_json::Value,
    },
    /// A retriable failure left the mutation queued for another attempt.
    Requeued {
        mutation_id: String,
        resource: String,
        retry_count: u32,
        error: String,
    },
    /// The mutation was parked: terminal failure or exhausted retries.
    DeadLettered {
        mutation_id: String,
        resource: String,
        error: String,
    },
}
