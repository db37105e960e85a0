//! Time source abstraction.
//!
//! Staleness and retry bookkeeping are all computed from Unix-millisecond
//! timestamps. Production code uses [`SystemClock`]; tests substitute a
//! manual clock so threshold behavior is exact rather than sleep-based.

/// A source of Unix-millisecond timestamps.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        now_millis()
    }
}

/// Get current wall-clock time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
