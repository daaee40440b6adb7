//! Token-bucket rate limiter for the entity service.
//!
//! One limiter is shared by all workers in a run, so concurrent page
//! fetches collectively honor a single global request ceiling. Uses
//! `Mutex + Condvar` from std — no external dependencies.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;

/// Upper bound on a single wait so cancellation is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(200);

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

/// Process-wide token bucket serializing permit acquisition.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    cond: Condvar,
}

impl RateLimiter {
    /// `rate_per_sec` sustained requests per second, `burst` extra headroom.
    pub fn new(rate_per_sec: f64, burst: usize) -> Self {
        let capacity = (burst as f64).max(1.0);
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                capacity,
                refill_per_sec: rate_per_sec.max(f64::MIN_POSITIVE),
                last_refill: Instant::now(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Block until one permit is available or the token trips.
    ///
    /// Returns false when cancelled; no permit is consumed in that case.
    pub fn acquire(&self, cancel: &CancelToken) -> bool {
        let mut bucket = self.bucket.lock().expect("rate limiter poisoned");
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            bucket.refill(Instant::now());
            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                return true;
            }
            let deficit = (1.0 - bucket.tokens) / bucket.refill_per_sec;
            let wait = Duration::from_secs_f64(deficit).min(WAIT_SLICE);
            // Nothing notifies; tokens come from time, so wait out the slice.
            let (guard, _) = self
                .cond
                .wait_timeout(bucket, wait)
                .expect("rate limiter poisoned");
            bucket = guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_permits_available_immediately() {
        let limiter = RateLimiter::new(1.0, 3);
        let cancel = CancelToken::new();
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.acquire(&cancel));
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn drained_bucket_paces_acquisition() {
        let limiter = RateLimiter::new(50.0, 1);
        let cancel = CancelToken::new();
        assert!(limiter.acquire(&cancel));
        let start = Instant::now();
        assert!(limiter.acquire(&cancel));
        // second permit needs ~20ms of refill
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn cancelled_acquire_returns_false() {
        let limiter = RateLimiter::new(0.001, 1);
        let cancel = CancelToken::new();
        assert!(limiter.acquire(&cancel));
        cancel.cancel();
        assert!(!limiter.acquire(&cancel));
    }

    #[test]
    fn concurrent_acquires_all_succeed() {
        use std::sync::Arc;
        let limiter = Arc::new(RateLimiter::new(200.0, 2));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(std::thread::spawn(move || {
                limiter.acquire(&CancelToken::new())
            }));
        }
        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}
