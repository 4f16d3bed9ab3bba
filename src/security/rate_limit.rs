//! Fixed-window rate limiting.
//!
//! # Responsibilities
//! - Count requests per client key inside a fixed time window
//! - Report limit, remaining budget, window reset time and retry hint
//! - Sweep expired windows in the background to bound memory
//!
//! # Design Decisions
//! - Fixed window: an expired window is replaced, never decremented
//! - Per-key state lives in a `KeyedStore`; the count/compare step is one
//!   atomic update per key
//! - The sweeper is its own task and never runs on the request path

use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::clock::{self, Clock};
use crate::config::WindowLimit;
use crate::observability::metrics;
use crate::store::{KeyedStore, MemoryStore};

/// Name reported in the `X-RateLimit-Backend` header.
pub const BACKEND_NAME: &str = "memory";

/// Counter for one client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    /// Epoch milliseconds at which the window ends.
    pub reset_time: i64,
}

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOutcome {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the window ends.
    pub reset_time: i64,
    /// Seconds until the window ends; only set on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Snapshot of a key's window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub count: u32,
    pub remaining: u32,
    pub reset_time: i64,
    pub backend: &'static str,
}

/// In-memory fixed-window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<dyn KeyedStore<RateLimitEntry>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), clock::system())
    }

    pub fn with_store(entries: Arc<dyn KeyedStore<RateLimitEntry>>, clock: Arc<dyn Clock>) -> Self {
        Self { entries, clock }
    }

    /// Count one request for `key` against `max_requests` per `window_ms`.
    pub fn check(&self, key: &str, window_ms: u64, max_requests: u32) -> RateLimitOutcome {
        let now = self.clock.now_millis();
        let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
        let mut current = RateLimitEntry {
            count: 1,
            reset_time: now.saturating_add(window),
        };

        self.entries.update(key, &mut |slot| {
            let expired = slot.as_ref().map_or(true, |entry| entry.reset_time < now);
            if expired {
                *slot = Some(current);
            } else if let Some(entry) = slot.as_mut() {
                entry.count = entry.count.saturating_add(1);
                current = *entry;
            }
        });

        let success = current.count <= max_requests;
        let retry_after = if success {
            None
        } else {
            let millis = (current.reset_time - now).max(0) as u64;
            Some(millis.div_ceil(1000))
        };

        RateLimitOutcome {
            success,
            limit: max_requests,
            remaining: max_requests.saturating_sub(current.count),
            reset_time: current.reset_time,
            retry_after,
        }
    }

    /// Same as [`check`](Self::check) with a configured window.
    pub fn check_limit(&self, key: &str, limit: WindowLimit) -> RateLimitOutcome {
        self.check(key, limit.window_ms, limit.max_requests)
    }

    /// Current window for `key`, measured against `max_requests`.
    pub fn stats(&self, key: &str, max_requests: u32) -> Option<RateLimitStats> {
        self.entries.get(key).map(|entry| RateLimitStats {
            count: entry.count,
            remaining: max_requests.saturating_sub(entry.count),
            reset_time: entry.reset_time,
            backend: BACKEND_NAME,
        })
    }

    /// Remove every entry whose window has ended. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(&mut |_, entry| entry.reset_time >= now);
        let after = self.entries.len();
        metrics::record_rate_limit_entries(after);
        before.saturating_sub(after)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run [`sweep`](Self::sweep) every `interval` until shutdown is signalled.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = limiter.len(), "Swept expired rate limit windows");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        (RateLimiter::with_store(Arc::new(MemoryStore::new()), clock.clone()), clock)
    }

    #[test]
    fn test_fixed_window_admits_then_rejects() {
        let (limiter, clock) = limiter();

        let first = limiter.check("client", 1000, 2);
        assert!(first.success);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.reset_time, 11_000);
        assert!(first.retry_after.is_none());

        let second = limiter.check("client", 1000, 2);
        assert!(second.success);
        assert_eq!(second.remaining, 0);

        clock.advance(300);
        let third = limiter.check("client", 1000, 2);
        assert!(!third.success);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.retry_after, Some(1));
        assert_eq!(third.reset_time, 11_000);

        clock.advance(701);
        let fourth = limiter.check("client", 1000, 2);
        assert!(fourth.success);
        assert_eq!(fourth.remaining, 1);
        assert_eq!(fourth.reset_time, 12_001);
    }

    #[test]
    fn test_window_boundary_still_counts() {
        let (limiter, clock) = limiter();
        limiter.check("k", 1000, 1);

        // reset_time == now is still inside the window.
        clock.advance(1000);
        let outcome = limiter.check("k", 1000, 1);
        assert!(!outcome.success);
        assert_eq!(outcome.retry_after, Some(0));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let (limiter, clock) = limiter();
        limiter.check("k", 60_000, 1);
        clock.advance(500);

        let outcome = limiter.check("k", 60_000, 1);
        assert_eq!(outcome.retry_after, Some(60));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter();
        assert!(limiter.check("a", 1000, 1).success);
        assert!(!limiter.check("a", 1000, 1).success);
        assert!(limiter.check("b", 1000, 1).success);
    }

    #[test]
    fn test_sweep_removes_expired_only() {
        let (limiter, clock) = limiter();
        limiter.check("short", 100, 5);
        limiter.check("long", 10_000, 5);

        clock.advance(500);
        assert_eq!(limiter.sweep(), 1);
        assert!(limiter.stats("short", 5).is_none());

        let stats = limiter.stats("long", 5).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.remaining, 4);
        assert_eq!(stats.backend, "memory");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_shutdown() {
        let (limiter, clock) = limiter();
        let (tx, rx) = broadcast::channel(1);
        let handle = limiter.spawn_sweeper(Duration::from_secs(60), rx);

        limiter.check("k", 100, 1);
        clock.advance(1000);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(limiter.is_empty());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
