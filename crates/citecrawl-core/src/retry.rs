//! Retry policy with exponential backoff, cap, and jitter.

use std::time::Duration;

use rand::Rng;

use crate::cancel::CancelToken;

/// Granularity of cancellation checks while sleeping through a backoff.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Backoff schedule for transient fetch failures.
///
/// Delay for attempt `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`, plus up to 50% random jitter so parallel workers do not
/// retry in lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Capped exponential delay for the given attempt, before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.pow(exp))
            .min(self.max_delay)
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        let half = base.as_millis() as u64 / 2;
        if half == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=half))
    }

    /// Sleep out the backoff for `attempt`, waking early on cancellation.
    ///
    /// Returns false if the token tripped before the delay elapsed.
    pub fn backoff(&self, attempt: u32, cancel: &CancelToken) -> bool {
        let mut remaining = self.jittered(attempt);
        while remaining > Duration::ZERO {
            if cancel.is_cancelled() {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
        !cancel.is_cancelled()
    }
}
