//! Reconnect backoff
//!
//! Attempts that start within `reset_after` of the previous attempt wait
//! for the current delay first; a quiet period longer than that resets the
//! delay to its floor. Every attempt doubles the delay up to the cap.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub floor: Duration,
    pub cap: Duration,
    pub reset_after: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(1),
            cap: Duration::from_secs(300),
            reset_after: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: BackoffConfig,
    current: Duration,
    last_attempt: Option<Instant>,
}

impl ReconnectBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            current: config.floor,
            last_attempt: None,
        }
    }

    /// Delay to wait before an attempt starting at `now`
    ///
    /// `None` when there was no previous attempt or it began long enough
    /// ago, in which case the delay is also reset to the floor.
    pub fn delay_before(&mut self, now: Instant) -> Option<Duration> {
        match self.last_attempt {
            Some(started) if now.saturating_duration_since(started) < self.config.reset_after => {
                Some(self.current)
            }
            _ => {
                self.current = self.config.floor;
                None
            }
        }
    }

    pub fn attempt_started(&mut self, at: Instant) {
        self.last_attempt = Some(at);
    }

    /// Double the delay after an attempt, whatever its outcome
    pub fn attempt_finished(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.config.cap);
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}
