//! # Fieldsync Core
//!
//! Core data model for the fieldsync offline-first data layer.
//!
//! This crate defines the types shared by every other fieldsync crate:
//!
//! - [`PendingMutation`] - a durable, retryable write operation
//! - [`CacheEntry`] - a TTL-stamped cached value
//! - [`RemoteError`] - the remote failure taxonomy (retriable vs terminal)
//! - [`Clock`] - a time source abstraction so staleness is deterministic
//!   in tests
//!
//! ## Design Principles
//!
//! - **No IO**: this crate has no knowledge of storage, network, or runtime
//! - **Wire-stable**: persisted shapes are camelCase JSON and never change
//!   meaning without a schema version bump in the store layer
//! - **Never lose a write**: a [`PendingMutation`] only ever transitions to
//!   applied (removed by its owner) or dead-lettered (retained, flagged)

pub mod clock;
pub mod entry;
pub mod mutation;
pub mod remote;

pub use clock::{now_millis, Clock, SystemClock};
pub use entry::CacheEntry;
pub use mutation::{MutationKind, PendingMutation};
pub use remote::{FailureClass, RemoteError};

/// Type aliases for clarity
pub type MutationId = String;
pub type Resource = String;
pub type Timestamp = i64;

/// Build a cache key from a logical resource name and a disambiguating
/// suffix (owner id, active filter, ...).
///
/// Two logically different result sets must never share a key, so call
/// sites always qualify the resource: `cache_key("orders", "open")` is
/// distinct from `cache_key("orders", "closed")`.
pub fn cache_key(resource: &str, suffix: &str) -> String {
    format!("{resource}:{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_disambiguate_filters() {
        assert_eq!(cache_key("orders", "42"), "orders:42");
        assert_ne!(cache_key("orders", "open"), cache_key("orders", "closed"));
    }
}
