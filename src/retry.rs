use std::{future::Future, time::Duration};

use crate::error::Error;

/// Longest combined wait a [RetryPolicy] may schedule: 23h59'
pub const MAX_TOTAL_WAIT_MINUTES: u32 = 23 * 60 + 59;

/// Fixed (non exponential) retry scheme.
/// Only obtained through [RetryPolicy::new], which enforces the wait ceiling.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries on top of the initial attempt
    max_attempts: u32,

    /// Pause between two attempts
    wait_between: Duration,
}

impl RetryPolicy {
    /// Builds a [RetryPolicy] from a number of retries and a wait period in minutes.
    /// Fails when the combined wait exceeds [MAX_TOTAL_WAIT_MINUTES].
    pub fn new(retries: u32, wait_minutes: u32) -> Result<Self, Error> {
        let total = (retries as u64) * (wait_minutes as u64);

        if total > MAX_TOTAL_WAIT_MINUTES as u64 {
            return Err(Error::RetryCeiling {
                retries,
                wait_minutes,
            });
        }

        Ok(Self {
            max_attempts: retries,
            wait_between: Duration::from_secs(wait_minutes as u64 * 60),
        })
    }

    /// Retries on top of the initial attempt
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between two attempts
    pub fn wait_between(&self) -> Duration {
        self.wait_between
    }

    /// Total number of attempts, initial one included
    pub fn total_attempts(&self) -> u32 {
        self.max_attempts.saturating_add(1)
    }

    /// Returns the wait to apply after given (1-based) attempt,
    /// None after the final one.
    pub fn wait_after(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.total_attempts() {
            Some(self.wait_between)
        } else {
            None
        }
    }
}

/// Suspension capability used between two attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// [Sleeper] backed by the tokio timer
#[derive(Debug, Default, Copy, Clone)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
