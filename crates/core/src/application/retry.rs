// Retry policy: exponential backoff with a bounded attempt budget

use chrono::Duration;
use tracing::warn;

use crate::application::worker::constants::{DEFAULT_BASE_DELAY_SECS, DEFAULT_MAX_RETRIES};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job after the given backoff delay
    Retry(Duration),
    /// Attempt budget exhausted; the job fails permanently
    Exhausted,
}

/// Pure retry policy.
///
/// `decide` is evaluated with the attempt count *before* the just-failed
/// attempt: a job fails terminally on the attempt that brings it to
/// `max_retries`, otherwise the next run is `base_delay * 2^retry_count`
/// in the future (5s, 10s, 20s, ... with the defaults).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: i32,
    base_delay_secs: i64,
}

impl RetryPolicy {
    pub fn new(max_retries: i32, base_delay_secs: i64) -> Self {
        Self {
            max_retries,
            base_delay_secs,
        }
    }

    pub fn max_retries(&self) -> i32 {
        self.max_retries
    }

    pub fn decide(&self, retry_count: i32) -> RetryDecision {
        if retry_count + 1 >= self.max_retries {
            warn!(
                retry_count = retry_count,
                max_retries = self.max_retries,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        // Shift capped so a corrupt retry_count cannot overflow the delay
        let exponent = retry_count.clamp(0, 32) as u32;
        let delay_secs = self.base_delay_secs.saturating_mul(1i64 << exponent);

        RetryDecision::Retry(Duration::seconds(delay_secs))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY_SECS)
    }
}
