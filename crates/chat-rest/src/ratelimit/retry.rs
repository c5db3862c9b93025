//! Bounded retry for transport failures

use rand::Rng;
use std::time::Duration;

/// How a bucket retries a request whose exchange failed to complete
///
/// A request is attempted at most `max_retries + 1` times. Delays grow
/// exponentially from `base_delay`, capped at `max_delay`, with up to 20%
/// jitter either way so that buckets failing together spread out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that fails a request on its first transport error
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `failures` failed ones
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }

    /// Delay before the attempt following the `failures`-th failure
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let nominal = self
            .base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay);

        let jitter = rand::thread_rng().gen_range(0.8..=1.2);
        nominal.mul_f64(jitter).min(self.max_delay)
    }
}
