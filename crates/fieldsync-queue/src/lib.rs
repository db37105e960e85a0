//! # Fieldsync Queue
//!
//! Durable FIFO list of pending write operations, persisted through the
//! fieldsync key-value store.
//!
//! ## Overview
//!
//! Every write a screen issues lands here first as a
//! [`fieldsync_core::PendingMutation`] and returns immediately; the sync
//! orchestrator drains the queue against the remote store when online.
//! The whole queue is persisted as one JSON array on every append, removal
//! and update, so a process restart reloads exactly what was pending.
//!
//! ## Guarantees
//!
//! - **FIFO**: insertion order, no reordering or coalescing across
//!   resources
//! - **No silent loss**: a mutation leaves the queue only by confirmed
//!   remote application or by explicit discard of a dead-lettered entry
//! - **Observable**: the pending count is a `watch` channel recomputed on
//!   every change

pub mod error;
pub mod queue;

pub use error::QueueError;
pub use queue::{FailureOutcome, MutationQueue, QUEUE_KEY};
