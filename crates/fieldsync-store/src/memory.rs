//! In-memory implementation of the KvStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite but
//! keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::traits::KvStore;

/// In-memory key-value store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
/// The BTreeMap keeps keys ordered, matching the SQLite prefix scan.
#[derive(Default)]
pub struct MemoryKv {
    inner: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        Ok(inner.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        inner.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        inner.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        Ok(inner
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
        inner.clear();
        Ok(())
    }
}
