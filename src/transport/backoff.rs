//! Reconnection delay schedule.
//!
//! Exponential backoff capped at `max_delay`, with up to 20% random jitter
//! added so many clients dropped by the same outage do not reconnect in
//! lockstep.

use std::time::Duration;

use rand::Rng;

const JITTER_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Automatic attempts after a failure before giving up. Zero disables
    /// automatic reconnection.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Whether `attempt` (1-based) is still within budget.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Delay before `attempt` (1-based), without jitter.
    #[must_use]
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay before `attempt` (1-based), jittered.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let jitter = rand::rng().random_range(0.0..=JITTER_RATIO);
        base + base.mul_f64(jitter)
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
