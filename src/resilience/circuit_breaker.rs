//! Circuit breaker for remote store protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: store assumed down, calls fail fast with `CircuitOpenError`
//! - Probe: first call after the reset timeout
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Closed: next call after reset_timeout resets the count, then runs
//! ```
//!
//! # Design Decisions
//! - Per-key circuit breaker; keys never share state
//! - Fail fast in Open state (the operation is not called)
//! - Reset is lazy: there is no timer, the next call observes the elapsed time
//! - A probe that fails is counted as the first failure of a fresh run, so it
//!   reopens the circuit immediately only when the threshold is 1
//! - State lives in a `KeyedStore`; no store lock is held while the
//!   operation runs

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::clock::{self, Clock};
use crate::config::CircuitBreakerConfig;
use crate::error::CircuitOpenError;
use crate::observability::metrics;
use crate::store::{KeyedStore, MemoryStore};

/// Key used when the caller does not name one.
pub const DEFAULT_KEY: &str = "default";

/// Per-key breaker bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerState {
    pub failure_count: u32,
    /// Epoch milliseconds of the most recent failure.
    pub last_failure_time: i64,
    pub open: bool,
}

/// Options binding a breaker to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerOptions {
    pub key: String,
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl CircuitBreakerOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Options for `key` using configured defaults.
    pub fn from_config(key: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(key)
            .failure_threshold(config.failure_threshold)
            .reset_timeout(Duration::from_millis(config.reset_timeout_ms))
    }
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(60_000),
        }
    }
}

/// Registry of breaker state keyed by name.
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    store: Arc<dyn KeyedStore<BreakerState>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    /// In-memory registry using the system clock.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), clock::system())
    }

    pub fn with_store(store: Arc<dyn KeyedStore<BreakerState>>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Bind `op` to the breaker named by `options.key`.
    pub fn wrap<F>(&self, op: F, options: CircuitBreakerOptions) -> CircuitBreaker<F> {
        CircuitBreaker {
            registry: self.clone(),
            options: Arc::new(options),
            op,
        }
    }

    /// Run `op` once under the breaker named by `options.key`.
    pub async fn call<F, Fut, T, E>(&self, options: &CircuitBreakerOptions, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        self.admit(options)?;

        match op().await {
            Ok(value) => {
                self.record_success(&options.key);
                Ok(value)
            }
            Err(e) => {
                self.record_failure(options);
                Err(e)
            }
        }
    }

    /// Snapshot of the state for `key`, if the key has been used.
    pub fn state(&self, key: &str) -> Option<BreakerState> {
        self.store.get(key)
    }

    /// Forget everything about `key`.
    pub fn reset(&self, key: &str) -> bool {
        self.store.delete(key)
    }

    /// Number of keys with state.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn admit(&self, options: &CircuitBreakerOptions) -> Result<(), CircuitOpenError> {
        let now = self.clock.now_millis();
        let reset_ms = options.reset_timeout.as_millis() as i64;
        let mut rejected = false;
        let mut probing = false;

        self.store.update(&options.key, &mut |slot| {
            if let Some(state) = slot.as_mut() {
                if state.open && now - state.last_failure_time > reset_ms {
                    *state = BreakerState::default();
                    probing = true;
                }
                rejected = state.open;
            }
        });

        if probing {
            tracing::info!(key = %options.key, "Circuit breaker reset timeout elapsed, probing");
        }
        if rejected {
            tracing::debug!(key = %options.key, "Circuit breaker open, rejecting call");
            metrics::record_circuit_rejected(&options.key);
            return Err(CircuitOpenError {
                key: options.key.clone(),
            });
        }
        Ok(())
    }

    fn record_success(&self, key: &str) {
        self.store.update(key, &mut |slot| {
            slot.get_or_insert_with(BreakerState::default).failure_count = 0;
        });
    }

    fn record_failure(&self, options: &CircuitBreakerOptions) {
        let now = self.clock.now_millis();
        let mut opened_at = None;

        self.store.update(&options.key, &mut |slot| {
            let state = slot.get_or_insert_with(BreakerState::default);
            state.failure_count = state.failure_count.saturating_add(1);
            state.last_failure_time = now;
            if !state.open && state.failure_count >= options.failure_threshold {
                state.open = true;
                opened_at = Some(state.failure_count);
            }
        });

        if let Some(failures) = opened_at {
            tracing::warn!(
                key = %options.key,
                failures,
                reset_timeout_ms = options.reset_timeout.as_millis() as u64,
                "Circuit breaker opened"
            );
            metrics::record_circuit_opened(&options.key);
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A zero-argument callable bound to one breaker key.
#[derive(Clone)]
pub struct CircuitBreaker<F> {
    registry: CircuitBreakerRegistry,
    options: Arc<CircuitBreakerOptions>,
    op: F,
}

impl<F, Fut, T, E> CircuitBreaker<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<CircuitOpenError>,
{
    pub async fn call(&self) -> Result<T, E> {
        self.registry.call(&self.options, || (self.op)()).await
    }
}

impl<F> CircuitBreaker<F> {
    pub fn key(&self) -> &str {
        &self.options.key
    }

    pub fn state(&self) -> Option<BreakerState> {
        self.registry.state(&self.options.key)
    }
}

static GLOBAL_REGISTRY: OnceLock<CircuitBreakerRegistry> = OnceLock::new();

/// Process-wide registry used by [`with_circuit_breaker`].
pub fn global_registry() -> &'static CircuitBreakerRegistry {
    GLOBAL_REGISTRY.get_or_init(CircuitBreakerRegistry::new)
}

/// Wrap `op` with a breaker from the process-wide registry.
///
/// Compatibility shim for call sites that cannot be handed a registry.
pub fn with_circuit_breaker<F>(op: F, options: CircuitBreakerOptions) -> CircuitBreaker<F> {
    global_registry().wrap(op, options)
}
