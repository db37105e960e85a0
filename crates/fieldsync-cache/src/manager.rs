//! The cache manager: stale-while-revalidate reads over the KV store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{broadcast, watch};

use fieldsync_core::{CacheEntry, Clock, RemoteError};
use fieldsync_store::KvStore;

use crate::error::CacheError;

/// Storage namespace for cache entries, so the cache and the queue can
/// share one KV store without colliding.
const CACHE_PREFIX: &str = "cache:";

/// Capacity of the refreshed-keys broadcast. A lagging subscriber misses
/// old notifications, which is fine: it re-reads and gets the fresh entry.
const REFRESH_CHANNEL_CAPACITY: usize = 64;

/// Result of a cache read.
///
/// `loading` from the UI contract has no field here: while the returned
/// future is pending the read is loading, and by the time it resolves it
/// no longer is. The umbrella crate's view binding re-adds the flag.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    /// The value, or `None` when the key is absent and unfetchable.
    pub data: Option<T>,
    /// Whether `data` came from the local cache rather than the network.
    pub is_from_cache: bool,
    /// Whether the served entry is past its freshness window.
    pub is_stale: bool,
}

impl<T> CacheRead<T> {
    fn empty() -> Self {
        Self {
            data: None,
            is_from_cache: false,
            is_stale: false,
        }
    }
}

/// Keyed, TTL-stamped read-through cache.
///
/// The cache is mutated only by `read`'s fetch paths and by the
/// invalidation methods; nothing else writes entries.
pub struct CacheManager<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    online: watch::Receiver<bool>,
    refreshed_tx: broadcast::Sender<String>,
}

impl<S: KvStore + 'static> CacheManager<S> {
    /// Create a cache manager over `store`.
    ///
    /// `online` is the (debounced) connectivity signal; the cache only
    /// reads it, it never probes the network itself.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, online: watch::Receiver<bool>) -> Self {
        let (refreshed_tx, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);
        Self {
            store,
            clock,
            online,
            refreshed_tx,
        }
    }

    /// Point-in-time connectivity as this cache sees it.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Subscribe to keys refreshed by background revalidation, so bound
    /// views can re-read and drop their stale flag.
    pub fn subscribe_refreshed(&self) -> broadcast::Receiver<String> {
        self.refreshed_tx.subscribe()
    }

    /// Stale-while-revalidate read.
    ///
    /// - Cached entry present: returned immediately, never waiting on the
    ///   network. If it is stale and we are online, `fetcher` runs in a
    ///   detached task; success overwrites the entry and broadcasts the
    ///   key, failure leaves the stale entry untouched.
    /// - Absent and online: `fetcher` runs inline and the result is cached.
    /// - Absent and offline (or the inline fetch fails): an empty read.
    ///   Messaging "unavailable" is the UI layer's job, not the cache's.
    pub async fn read<T, F, Fut>(&self, key: &str, ttl: Duration, fetcher: F) -> CacheRead<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        let now = self.clock.now_millis();

        if let Some(entry) = self.load_entry(key).await {
            match entry.decode::<T>() {
                Ok(data) => {
                    let is_stale = entry.is_stale(now);
                    if is_stale && self.is_online() {
                        self.spawn_revalidation(key.to_string(), ttl, fetcher);
                    }
                    return CacheRead {
                        data: Some(data),
                        is_from_cache: true,
                        is_stale,
                    };
                }
                Err(e) => {
                    // Corrupt entry: recover as a miss rather than crash.
                    tracing::warn!(key, error = %e, "undecodable cache entry, treating as miss");
                }
            }
        }

        if !self.is_online() {
            return CacheRead::empty();
        }

        match fetcher().await {
            Ok(data) => {
                if let Err(e) = Self::write_entry(&self.store, &*self.clock, key, &data, ttl).await
                {
                    tracing::warn!(key, error = %e, "failed to cache fetched value");
                }
                CacheRead {
                    data: Some(data),
                    is_from_cache: false,
                    is_stale: false,
                }
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cold fetch failed, serving empty read");
                CacheRead::empty()
            }
        }
    }

    /// Remove the entry for `key`. Idempotent: invalidating an absent key
    /// does nothing.
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.delete(&storage_key(key)).await {
            tracing::warn!(key, error = %e, "cache invalidation failed");
        }
    }

    /// Remove every entry whose cache key starts with `prefix`. Used after
    /// a confirmed mutation so all views over that resource refetch.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let keys = match self.store.keys_with_prefix(&storage_key(prefix)).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(prefix, error = %e, "cache prefix scan failed");
                return;
            }
        };
        for key in keys {
            if let Err(e) = self.store.delete(&key).await {
                tracing::warn!(key, error = %e, "cache invalidation failed");
            }
        }
    }

    /// Load and parse the entry for `key`, treating every failure as a
    /// miss.
    async fn load_entry(&self, key: &str) -> Option<CacheEntry> {
        let bytes = match self.store.get(&storage_key(key)).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    async fn write_entry<T: Serialize>(
        store: &S,
        clock: &dyn Clock,
        key: &str,
        data: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(data, clock.now_millis(), ttl)?;
        let bytes = serde_json::to_vec(&entry)?;
        store.set(&storage_key(key), bytes).await?;
        Ok(())
    }

    /// Revalidate `key` in a detached task. The triggering read is never
    /// awaited on this; whichever concurrent revalidation completes last
    /// wins the entry.
    fn spawn_revalidation<T, F, Fut>(&self, key: String, ttl: Duration, fetcher: F)
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let refreshed_tx = self.refreshed_tx.clone();

        tokio::spawn(async move {
            match fetcher().await {
                Ok(data) => {
                    match Self::write_entry(&store, &*clock, &key, &data, ttl).await {
                        Ok(()) => {
                            // No subscribers is fine.
                            let _ = refreshed_tx.send(key);
                        }
                        Err(e) => {
                            tracing::warn!(key, error = %e, "failed to store revalidated value");
                        }
                    }
                }
                Err(e) => {
                    // Stale data beats no data; keep serving the old entry.
                    tracing::debug!(key, error = %e, "revalidation failed, keeping stale entry");
                }
            }
        });
    }
}

fn storage_key(key: &str) -> String {
    format!("{CACHE_PREFIX}{key}")
}
