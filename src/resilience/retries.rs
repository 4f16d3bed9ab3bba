//! Retry executor.
//!
//! # Responsibilities
//! - Re-invoke a failing async operation up to a fixed number of attempts
//! - Wait between attempts on a deterministic exponential schedule
//!
//! # Design Decisions
//! - The last attempt's error is returned unmodified; earlier errors are
//!   logged at debug and dropped
//! - No jitter and no retry budget; callers that need attempt history
//!   instrument the operation themselves

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::ExponentialBackoff;

/// Message of the error produced when zero attempts were allowed.
pub const NO_ATTEMPTS_MESSAGE: &str = "Operation failed";

/// Retry `op` up to `max_attempts` times.
///
/// The first retry waits `initial_delay`; each later wait is the previous one
/// times `backoff_multiplier`. With `max_attempts == 0` the operation never
/// runs and `E::from(NO_ATTEMPTS_MESSAGE)` is returned.
pub async fn with_retry<F, Fut, T, E>(
    mut op: F,
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + From<&'static str>,
{
    let mut backoff = ExponentialBackoff::new(initial_delay, backoff_multiplier);
    let mut attempt = 0;

    while attempt < max_attempts {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt == max_attempts => {
                tracing::debug!(attempt, error = %e, "Final attempt failed");
                return Err(e);
            }
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::debug!(attempt, delay = ?delay, error = %e, "Attempt failed, retrying");
                metrics::record_retry();
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(E::from(NO_ATTEMPTS_MESSAGE))
}

/// Retry settings bundled from configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_multiplier,
        }
    }

    pub async fn run<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + From<&'static str>,
    {
        with_retry(op, self.max_attempts, self.initial_delay, self.backoff_multiplier).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_multiplier,
        )
    }
}
