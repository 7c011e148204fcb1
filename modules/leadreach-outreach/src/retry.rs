//! Bounded retry with exponential backoff, one policy per external call type.
//!
//! Retrying never changes how a failure is treated once attempts run out:
//! the caller still applies its own isolate/degrade/abort rule to the final
//! error.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Jitter applied to each backoff, as a fraction of the computed delay.
const JITTER_FACTOR: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. 1 means no retry.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(10),
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Un-jittered delay before retry number `attempt` (1-based):
    /// `base × 2^(attempt-1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt).as_secs_f64();
        if delay == 0.0 {
            return Duration::ZERO;
        }
        let range = delay * JITTER_FACTOR;
        let jitter = rand::random_range(-range..range);
        Duration::from_secs_f64((delay + jitter).max(0.0))
    }

    /// Run `op` until it succeeds, returns a non-retryable error, or the
    /// attempts are spent. Returns the last error in the latter two cases.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        is_retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    let delay = self.jittered_backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Retry policy per external call type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicies {
    pub extraction: RetryPolicy,
    pub scoring: RetryPolicy,
    pub messaging: RetryPolicy,
    pub classification: RetryPolicy,
    pub store_write: RetryPolicy,
    /// A retried send can double-deliver, so this stays at one attempt.
    pub channel_send: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        let ai = RetryPolicy::new(3, Duration::from_millis(500));
        Self {
            extraction: ai,
            scoring: ai,
            messaging: ai,
            classification: ai,
            store_write: RetryPolicy::new(3, Duration::from_millis(250)),
            channel_send: RetryPolicy::none(),
        }
    }
}

impl RetryPolicies {
    pub fn none() -> Self {
        Self {
            extraction: RetryPolicy::none(),
            scoring: RetryPolicy::none(),
            messaging: RetryPolicy::none(),
            classification: RetryPolicy::none(),
            store_write: RetryPolicy::none(),
            channel_send: RetryPolicy::none(),
        }
    }
}
