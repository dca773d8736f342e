//! Exponential reconnect backoff.
//!
//! Kept apart from any connection object so the schedule can be tested
//! without a live feed.

use std::time::Duration;

/// Base and ceiling of an exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// First delay, and the delay after every reset.
    pub base: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Backoff state: the delay to use for the next retry.
///
/// Each call to [`next_delay`](Backoff::next_delay) returns the current
/// delay and doubles it for the following call, up to the policy ceiling.
/// [`reset`](Backoff::reset) goes back to the base delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.base.min(policy.max),
        }
    }

    /// Return the delay to wait now and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .unwrap_or(self.policy.max)
            .min(self.policy.max);
        delay
    }

    /// Go back to the base delay (after a successful connection).
    pub fn reset(&mut self) {
        self.current = self.policy.base.min(self.policy.max);
    }

    /// The delay the next call to `next_delay` will return.
    pub fn current(&self) -> Duration {
        self.current
    }
}
