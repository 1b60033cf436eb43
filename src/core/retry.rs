//! Bounded retry with exponential backoff

use crate::error::Result;
use std::thread;
use std::time::Duration;

/// Retry policy: `retries` extra attempts after the first, waiting
/// `initial_backoff`, then twice that, and so on, capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub const NONE: RetryPolicy = RetryPolicy {
        retries: 0,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    };

    pub fn new(retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            retries,
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.min(16)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// `on_error` sees every failure with its 1-based attempt number; the last
    /// error is returned.
    pub fn run<T, F, E>(&self, mut op: F, mut on_error: E) -> Result<T>
    where
        F: FnMut() -> Result<T>,
        E: FnMut(u32, &crate::error::Error),
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    on_error(attempt, &e);
                    if attempt > self.retries {
                        return Err(e);
                    }
                    let delay = self.backoff(attempt - 1);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}
