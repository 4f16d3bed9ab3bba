//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Remote store call:
//!     → circuit_breaker.rs (fail fast if the key's circuit is open)
//!     → timeouts.rs (deadline for the whole retried call)
//!     → retries.rs (re-invoke with exponential backoff)
//!     → the operation itself
//! ```
//!
//! # Design Decisions
//! - Every guard is generic over the caller's error type; the operation's
//!   own error passes through untouched
//! - Guards add an error only when they refuse to run the operation
//! - All state is per-process

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{
    with_circuit_breaker, BreakerState, CircuitBreaker, CircuitBreakerOptions, CircuitBreakerRegistry,
};
pub use retries::{with_retry, RetryPolicy};
pub use timeouts::with_timeout;

use std::future::Future;
use std::time::Duration;

use crate::config::ResilienceConfig;
use crate::error::{CircuitOpenError, TimeoutError};

/// Apply the standard layering `CircuitBreaker(Timeout(Retry(op)))`.
pub async fn guarded<F, Fut, T, E>(
    registry: &CircuitBreakerRegistry,
    breaker: &CircuitBreakerOptions,
    timeout: Duration,
    retry: &RetryPolicy,
    op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + From<&'static str> + From<TimeoutError> + From<CircuitOpenError>,
{
    registry
        .call(breaker, || with_timeout(|| retry.run(op), timeout))
        .await
}

/// The three guards bundled for one named dependency.
#[derive(Clone)]
pub struct GuardPolicy {
    pub breakers: CircuitBreakerRegistry,
    pub breaker: CircuitBreakerOptions,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl GuardPolicy {
    /// Policy for the dependency `key` using configured defaults.
    pub fn from_config(
        key: impl Into<String>,
        breakers: CircuitBreakerRegistry,
        config: &ResilienceConfig,
    ) -> Self {
        Self {
            breakers,
            breaker: CircuitBreakerOptions::from_config(key, &config.circuit_breaker),
            timeout: Duration::from_millis(config.timeouts.operation_ms),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    pub async fn run<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + From<&'static str> + From<TimeoutError> + From<CircuitOpenError>,
    {
        guarded(&self.breakers, &self.breaker, self.timeout, &self.retry, op).await
    }
}
