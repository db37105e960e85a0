//! The remote data store seam.
//!
//! Everything network-shaped sits behind this trait: the production
//! implementation wraps the backend API client, tests script outcomes.
//! The drain and the cache's fetchers both go through it.

use std::sync::Arc;

use async_trait::async_trait;

use fieldsync_core::{PendingMutation, RemoteError};

/// Backend the local layer syncs against.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Apply one mutation. On success returns the authoritative record
    /// (for inserts this carries the server-assigned id).
    async fn apply(&self, mutation: &PendingMutation) -> Result<serde_json::Value, RemoteError>;

    /// Fetch records for a resource, optionally filtered.
    async fn fetch(
        &self,
        resource: &str,
        query: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, RemoteError>;
}

// So callers can hand a portal a shared handle and keep one themselves.
#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn apply(&self, mutation: &PendingMutation) -> Result<serde_json::Value, RemoteError> {
        (**self).apply(mutation).await
    }

    async fn fetch(
        &self,
        resource: &str,
        query: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, RemoteError> {
        (**self).fetch(resource, query).await
    }
}
