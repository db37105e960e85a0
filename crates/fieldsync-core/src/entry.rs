//! Cached values and their freshness window.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// A single cached value, persisted per cache key as
/// `{"data": ..., "fetchedAt": ..., "ttl": ...}`.
///
/// An entry is never discarded for being stale; staleness only gates
/// whether a background revalidation is triggered. Entries are removed
/// only by explicit invalidation or storage eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Last known value for the key.
    pub data: serde_json::Value,
    /// When `data` was obtained (Unix ms).
    pub fetched_at: i64,
    /// Freshness window in milliseconds.
    #[serde(rename = "ttl")]
    pub ttl_ms: i64,
}

impl CacheEntry {
    /// Create an entry from a freshly fetched value.
    pub fn new<T: Serialize>(
        data: &T,
        fetched_at: i64,
        ttl: Duration,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: serde_json::to_value(data)?,
            fetched_at,
            ttl_ms: ttl.as_millis() as i64,
        })
    }

    /// Whether the entry is past its freshness window at `now`.
    ///
    /// Strict threshold: an entry fetched at `t` with ttl `T` is fresh
    /// through `t + T` inclusive and stale from `t + T + 1`.
    pub fn is_stale(&self, now: i64) -> bool {
        now - self.fetched_at > self.ttl_ms
    }

    /// Decode the cached value into its concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}
