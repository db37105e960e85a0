//! # Fieldsync
//!
//! The unified API for the fieldsync system - an offline-first data layer
//! for mobile business portals.
//!
//! ## Overview
//!
//! Fieldsync keeps a field technician's app usable with no connectivity:
//!
//! - **Reads** are cache-first with stale-while-revalidate: cached data is
//!   served immediately, a background refresh follows when online
//! - **Writes** never touch the network directly; they land in a durable
//!   FIFO queue and drain to the remote store when connectivity allows
//! - **Views** bind to a resource and see queued mutations layered over
//!   the cached records, so the user's own work is visible instantly
//! - **Sync** is single-flight and strictly ordered, with retriable
//!   failures retried under backoff and terminal ones dead-lettered
//!
//! ## Key Concepts
//!
//! - **Mutation**: a durable write. Leaves the queue only when the remote
//!   store confirms it or the user discards a dead letter.
//! - **Dead letter**: a mutation parked after a terminal failure or an
//!   exhausted retry budget. Retained, never silently dropped.
//! - **Temp id**: client-assigned identity for an optimistic insert,
//!   resolved to the server id once the insert lands.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::{Portal, PortalConfig};
//! use fieldsync::store::SqliteKv;
//! # use fieldsync::sync::RemoteStore;
//! use serde_json::json;
//!
//! async fn example(remote: impl RemoteStore + 'static) {
//!     let store = SqliteKv::open("portal.db").unwrap();
//!     let portal = Portal::new(store, remote, PortalConfig::default()).await;
//!
//!     // Cache-first read; empty on a cold offline start.
//!     let orders = portal.read("work_orders", None).await;
//!
//!     // Durable write; syncs when connectivity allows.
//!     portal
//!         .insert("work_orders", json!({"title": "fix pump"}))
//!         .await
//!         .unwrap();
//!
//!     portal.report_connectivity(true);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `fieldsync::core` - Core data model (PendingMutation, CacheEntry, ...)
//! - `fieldsync::store` - Durable KV storage (SQLite and in-memory)
//! - `fieldsync::cache` - Stale-while-revalidate cache
//! - `fieldsync::queue` - Durable mutation queue
//! - `fieldsync::sync` - Connectivity monitoring and drain orchestration

pub mod binding;
pub mod client;
pub mod error;

// Re-export component crates
pub use fieldsync_cache as cache;
pub use fieldsync_core as core;
pub use fieldsync_queue as queue;
pub use fieldsync_store as store;
pub use fieldsync_sync as sync;

// Re-export main types for convenience
pub use binding::{BoundRecord, RecordStatus, ResourceView, TempIdMap};
pub use client::{Portal, PortalConfig, PortalStatus};
pub use error::{PortalError, Result};

// Re-export commonly used component types
pub use fieldsync_cache::CacheRead;
pub use fieldsync_core::{CacheEntry, MutationKind, PendingMutation, RemoteError};
pub use fieldsync_sync::{
    ConnectivityProbe, DrainPolicy, MonitorConfig, QueueEvent, RemoteStore, RetryPolicy,
    SyncConfig, SyncReport, SyncState,
};
