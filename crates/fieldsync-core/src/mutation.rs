//! Pending write operations.
//!
//! Writes are expressed as queued mutations, not direct remote calls.
//! This is what lets the user keep working while disconnected: a mutation
//! is durable from the moment it is enqueued and only leaves the queue
//! when the remote store confirms it (applied) or when it has exhausted
//! its retries (dead-lettered, retained for explicit user action).

use serde::{Deserialize, Serialize};

/// The kind of write a mutation performs at the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

/// A durable, retryable write operation.
///
/// Persisted as one element of the queue's JSON array, camelCase on the
/// wire. `payload` is opaque to this layer; for inserts it may carry
/// a client-assigned `tempId` correlating the optimistic local record to
/// the eventual server-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    /// Locally generated unique id, stable for the mutation's lifetime.
    pub id: String,
    /// What to do at the remote store.
    pub kind: MutationKind,
    /// Logical table/collection name at the remote store.
    pub resource: String,
    /// Data to send.
    pub payload: serde_json::Value,
    /// When the mutation was enqueued (Unix ms).
    pub created_at: i64,
    /// Delivery attempts that have failed so far.
    pub retry_count: u32,
    /// Retry budget, supplied per call site.
    pub max_retries: u32,
    /// Message of the most recent failure, if any.
    pub last_error: Option<String>,
    /// Set once retries are exhausted or a terminal failure occurs.
    /// Dead-lettered mutations are retained, never auto-discarded.
    pub dead_lettered: bool,
}

impl PendingMutation {
    /// Create a new queued mutation with a fresh id.
    pub fn new(
        kind: MutationKind,
        resource: impl Into<String>,
        payload: serde_json::Value,
        max_retries: u32,
        created_at: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            resource: resource.into(),
            payload,
            created_at,
            retry_count: 0,
            max_retries,
            last_error: None,
            dead_lettered: false,
        }
    }

    /// The client-assigned temp id inside the payload, if this mutation
    /// carries one (inserts correlating an optimistic local record).
    pub fn temp_id(&self) -> Option<&str> {
        self.payload.get("tempId").and_then(|v| v.as_str())
    }

    /// Whether another retriable failure would exhaust the retry budget.
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}
