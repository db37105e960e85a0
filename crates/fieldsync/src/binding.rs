//! Optimistic view binding.
//!
//! A screen binds to a resource and sees the cached records with the
//! queued-but-unconfirmed mutations layered on top: an insert that is
//! still in the queue shows up as a pending row, an update shows its new
//! field values, a delete hides the row. Each overlaid record carries a
//! status so the UI can badge it.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use fieldsync_core::{MutationKind, PendingMutation};

/// Sync status of one bound record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Confirmed by the remote store (came from the cache as-is).
    Synced,
    /// A queued mutation touches this record.
    Pending,
    /// The touching mutation is dead-lettered; needs user attention.
    Failed,
}

/// One record as a bound view sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRecord {
    pub data: Value,
    pub status: RecordStatus,
}

/// A resource as a bound view sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceView {
    pub records: Vec<BoundRecord>,
    /// Whether the underlying read came from the local cache.
    pub is_from_cache: bool,
    /// Whether the cached read is past its freshness window.
    pub is_stale: bool,
    /// True only for the placeholder view shown before the first read
    /// resolves; a resolved view is never loading.
    pub loading: bool,
}

impl ResourceView {
    /// Placeholder shown while the first read is in flight.
    pub fn loading() -> Self {
        Self {
            records: Vec::new(),
            is_from_cache: false,
            is_stale: false,
            loading: true,
        }
    }
}

/// Layer queued mutations for one resource over its cached records.
///
/// `cached` is the record array from the cache (absent on a cold miss);
/// `mutations` are this resource's queued mutations in FIFO order. Later
/// mutations see the effect of earlier ones, matching what the drain will
/// do at the remote store.
pub fn overlay(cached: Option<&Value>, mutations: &[PendingMutation]) -> Vec<BoundRecord> {
    let mut records: Vec<BoundRecord> = cached
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| BoundRecord {
                    data: row.clone(),
                    status: RecordStatus::Synced,
                })
                .collect()
        })
        .unwrap_or_default();

    for mutation in mutations {
        let status = if mutation.dead_lettered {
            RecordStatus::Failed
        } else {
            RecordStatus::Pending
        };
        match mutation.kind {
            MutationKind::Insert => {
                records.push(BoundRecord {
                    data: mutation.payload.clone(),
                    status,
                });
            }
            MutationKind::Update => {
                let Some(target) = mutation.payload.get("id") else {
                    continue;
                };
                if let Some(record) = records.iter_mut().find(|r| matches_id(&r.data, target)) {
                    merge_fields(&mut record.data, &mutation.payload);
                    record.status = status;
                }
            }
            MutationKind::Delete => {
                let Some(target) = mutation.payload.get("id") else {
                    continue;
                };
                records.retain(|r| !matches_id(&r.data, target));
            }
        }
    }

    records
}

/// A record matches by its server id or, for optimistic rows the server
/// has not named yet, by its temp id.
fn matches_id(data: &Value, target: &Value) -> bool {
    data.get("id") == Some(target) || data.get("tempId") == Some(target)
}

/// Shallow merge of `patch`'s fields into `data`.
fn merge_fields(data: &mut Value, patch: &Value) {
    let (Value::Object(data), Value::Object(patch)) = (data, patch) else {
        return;
    };
    for (field, value) in patch {
        data.insert(field.clone(), value.clone());
    }
}

/// In-memory temp id to server id mapping, fed by applied-mutation
/// events. Lets UI code holding a temp id (a navigation param, a list
/// key) find the record's server identity once the insert lands.
#[derive(Default)]
pub struct TempIdMap {
    inner: RwLock<HashMap<String, String>>,
}

impl TempIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, temp_id: impl Into<String>, server_id: impl Into<String>) {
        self.inner
            .write()
            .await
            .insert(temp_id.into(), server_id.into());
    }

    pub async fn resolve(&self, temp_id: &str) -> Option<String> {
        self.inner.read().await.get(temp_id).cloned()
    }
}
