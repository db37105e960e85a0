//! # Fieldsync Cache
//!
//! Keyed, TTL-stamped read-through cache with stale-while-revalidate
//! semantics, built on the fieldsync key-value store.
//!
//! ## Overview
//!
//! [`CacheManager::read`] serves whatever is cached immediately and only
//! goes to the network when it has to: a cold key is fetched inline while
//! online, a stale key is revalidated in a detached background task, and
//! offline reads fall back to whatever is there. The UI never blocks on
//! the network for data it has seen before - a guess using old data beats
//! a spinner.
//!
//! ## Failure Policy
//!
//! This layer never surfaces errors to its callers. Storage failures are
//! treated as cache misses, fetch and revalidation failures are logged and
//! suppressed, and the caller sees only the [`CacheRead`] state fields.

pub mod error;
pub mod manager;

pub use error::CacheError;
pub use manager::{CacheManager, CacheRead};
