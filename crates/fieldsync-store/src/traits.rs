//! KvStore trait: the abstract interface for durable key-value persistence.
//!
//! This trait allows the cache and queue layers to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;

use crate::error::Result;

/// The KvStore trait: async interface over string keys holding serialized
/// values.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **Opaque values**: the store never inspects the bytes; serialization
///   is the caller's concern.
/// - **Prefix scans**: `keys_with_prefix` is the only query primitive and
///   backs prefix invalidation in the cache layer.
/// - **Failure mode**: callers above this layer treat a failed `get` the
///   same as an absent key.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove the value stored under `key`. Removing an absent key is not
    /// an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all keys starting with `prefix`, in lexicographic order.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove every key in the store.
    async fn clear(&self) -> Result<()>;
}
