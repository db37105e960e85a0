//! # Fieldsync Store
//!
//! Durable key-value storage for the fieldsync data layer. Provides a
//! trait-based interface over string keys holding serialized values, with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The cache and the mutation queue both persist through the [`KvStore`]
//! trait, keeping them storage-agnostic. The primary implementation is
//! [`SqliteKv`], with [`MemoryKv`] for tests.
//!
//! ## Key Types
//!
//! - [`KvStore`] - the async trait for all storage operations
//! - [`SqliteKv`] - SQLite-based persistent storage
//! - [`MemoryKv`] - in-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync_store::{KvStore, SqliteKv};
//!
//! async fn example() {
//!     let store = SqliteKv::open("fieldsync.db").unwrap();
//!
//!     store.set("orders:42", br#"{"id":42}"#.to_vec()).await.unwrap();
//!     let value = store.get("orders:42").await.unwrap();
//!     assert!(value.is_some());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Local-only**: every operation hits local disk or memory, never the
//!   network; callers may await these from UI-adjacent code
//! - **Defensive callers**: the cache and queue layers treat a failed read
//!   the same as a missing key, so a corrupt local store degrades to a
//!   cache miss instead of crashing the app

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryKv;
pub use sqlite::SqliteKv;
pub use traits::KvStore;
