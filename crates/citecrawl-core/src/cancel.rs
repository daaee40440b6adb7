//! Cooperative cancellation for crawl runs.
//!
//! A token is handed to the scheduler by the caller; signal handlers or a
//! deadline flip it, and workers abandon in-flight work at the next check.
//! Cancellation is not an error: partial results are kept.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation token with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also trips once `timeout` has elapsed.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self::new().deadline_in(timeout)
    }

    /// Derive a token sharing this flag that additionally trips after
    /// `timeout`. Cancelling either token cancels both; the deadline only
    /// binds the derived one.
    pub fn deadline_in(&self, timeout: Duration) -> Self {
        Self {
            flag: self.flag.clone(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation. Returns the previous state, so signal handlers
    /// can force-exit on the second signal.
    pub fn cancel(&self) -> bool {
        self.flag.swap(true, Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
