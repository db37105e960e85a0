//! # Fieldsync Sync
//!
//! Connectivity monitoring and queue drain orchestration.
//!
//! ## Overview
//!
//! Two collaborators live here. The [`NetworkMonitor`] turns raw
//! reachability reports from the host platform into a debounced online
//! signal. The [`SyncOrchestrator`] drains the mutation queue against a
//! [`RemoteStore`] whenever that signal says online and a trigger fires:
//! reconnect, app foreground, or an explicit `sync_now`.
//!
//! ## Guarantees
//!
//! - **Single flight**: at most one drain at a time; concurrent triggers
//!   join the in-flight drain and share its report
//! - **Order**: mutations are delivered strictly oldest first
//! - **No loss on failure**: retriable failures keep the mutation queued,
//!   terminal failures park it as a dead letter for explicit user action

pub mod backoff;
pub mod events;
pub mod monitor;
pub mod orchestrator;
pub mod remote;

pub use backoff::RetryPolicy;
pub use events::QueueEvent;
pub use monitor::{ConnectivityProbe, MonitorConfig, NetworkMonitor};
pub use orchestrator::{DrainPolicy, SyncConfig, SyncOrchestrator, SyncReport, SyncState};
pub use remote::RemoteStore;
