//! Retry delay schedule.

use std::time::Duration;

use rand::Rng;

/// Largest exponent applied to the base delay; beyond this the cap
/// dominates anyway and the shift would overflow.
const MAX_EXPONENT: u32 = 16;

/// Capped exponential backoff with full jitter.
///
/// The drain sleeps `delay_for(n)` before the n-th redelivery of a
/// mutation. Full jitter (a uniform draw from zero to the capped
/// exponential value) keeps a fleet of reconnecting devices from hitting
/// the backend in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No delay at all. For tests and interactive retry buttons.
    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            cap: Duration::ZERO,
        }
    }

    /// Delay before retry attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
        let ceiling = self
            .base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.cap);
        if ceiling.is_zero() {
            return Duration::ZERO;
        }
        let millis = ceiling.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }
}
