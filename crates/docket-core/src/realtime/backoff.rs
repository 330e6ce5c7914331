//! Exponential reconnect backoff.

use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
const DEFAULT_MAX_GROWTH_ATTEMPTS: u32 = 10;

/// Reconnect delay policy.
///
/// `delay(n) = min(base * 2^min(n, max_growth_attempts), max_delay)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Attempt count at which growth stops
    pub max_growth_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_growth_attempts: DEFAULT_MAX_GROWTH_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration, max_growth_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_growth_attempts,
        }
    }

    /// Delay before the reconnect that follows `attempt` failed attempts.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(self.max_growth_attempts).min(31);
        let factor = 1_u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
