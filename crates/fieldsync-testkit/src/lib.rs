//! # Fieldsync Testkit
//!
//! Testing utilities for the fieldsync data layer: deterministic clocks,
//! scripted remote stores, ready-made portals, and proptest strategies
//! over the core data model.
//!
//! Everything here is test-only tooling; nothing ships in a production
//! portal.

pub mod fixtures;
pub mod generators;

pub use fixtures::{fast_config, memory_portal, ManualClock, ScriptedRemote, StaticProbe};
