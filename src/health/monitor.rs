//! Periodic health polling of the remote store.
//!
//! # Responsibilities
//! - Probe the store on a fixed interval, bounded by a per-probe deadline
//! - Keep the most recent results for the status endpoint
//! - Log transitions between health levels

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::time;

use crate::clock;
use crate::components::{ComponentError, HealthLevel, StoreClient, StoreHealth};
use crate::config::HealthCheckConfig;
use crate::resilience::with_timeout;

/// Number of probe results kept.
pub const HISTORY_LEN: usize = 10;

/// Bounded, shareable history of probe results, oldest first.
#[derive(Debug, Clone, Default)]
pub struct HealthHistory {
    entries: Arc<ArcSwap<VecDeque<StoreHealth>>>,
}

impl HealthHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, health: StoreHealth) {
        self.entries.rcu(|current| {
            let mut next = VecDeque::clone(current);
            next.push_back(health.clone());
            while next.len() > HISTORY_LEN {
                next.pop_front();
            }
            next
        });
    }

    pub fn latest(&self) -> Option<StoreHealth> {
        self.entries.load().back().cloned()
    }

    pub fn snapshot(&self) -> Vec<StoreHealth> {
        self.entries.load().iter().cloned().collect()
    }
}

pub struct HealthMonitor {
    client: Arc<dyn StoreClient>,
    interval: Duration,
    timeout: Duration,
    history: HealthHistory,
}

impl HealthMonitor {
    pub fn new(client: Arc<dyn StoreClient>, interval: Duration, timeout: Duration) -> Self {
        Self {
            client,
            interval,
            timeout,
            history: HealthHistory::new(),
        }
    }

    pub fn from_config(client: Arc<dyn StoreClient>, config: &HealthCheckConfig) -> Self {
        Self::new(
            client,
            config.interval(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn history(&self) -> HealthHistory {
        self.history.clone()
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            timeout_ms = self.timeout.as_millis() as u64,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut last_level: Option<HealthLevel> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let health = self.check_once().await;
                    if last_level != Some(health.status) {
                        match last_level {
                            Some(previous) => tracing::warn!(
                                from = previous.as_str(),
                                to = health.status.as_str(),
                                error = health.error.as_deref().unwrap_or(""),
                                "Store health changed"
                            ),
                            None => tracing::info!(
                                status = health.status.as_str(),
                                latency_ms = health.latency_ms,
                                "Initial store health"
                            ),
                        }
                        last_level = Some(health.status);
                    }
                    self.history.push(health);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe once. Failures and timeouts become an unhealthy result.
    pub async fn check_once(&self) -> StoreHealth {
        let client = self.client.clone();
        let result: Result<StoreHealth, ComponentError> =
            with_timeout(|| async move { client.health_check().await }, self.timeout).await;

        result.unwrap_or_else(|e| StoreHealth {
            status: HealthLevel::Unhealthy,
            latency_ms: self.timeout.as_millis() as u64,
            checked_at: clock::to_rfc3339(clock::system().now_millis()),
            error: Some(e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::MemoryStoreClient;
    use async_trait::async_trait;

    struct SlowStore;

    #[async_trait]
    impl StoreClient for SlowStore {
        fn is_available(&self) -> bool {
            true
        }

        async fn health_check(&self) -> Result<StoreHealth, ComponentError> {
            time::sleep(Duration::from_secs(10)).await;
            unreachable!("probe should have timed out")
        }

        async fn shutdown(&self) -> Result<(), ComponentError> {
            Ok(())
        }
    }

    fn health(status: HealthLevel) -> StoreHealth {
        StoreHealth {
            status,
            latency_ms: 0,
            checked_at: String::new(),
            error: None,
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let history = HealthHistory::new();
        for i in 0..(HISTORY_LEN + 3) {
            let mut h = health(HealthLevel::Healthy);
            h.latency_ms = i as u64;
            history.push(h);
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), HISTORY_LEN);
        assert_eq!(snapshot[0].latency_ms, 3);
        assert_eq!(history.latest().unwrap().latency_ms, (HISTORY_LEN + 2) as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unhealthy() {
        let monitor = HealthMonitor::new(
            Arc::new(SlowStore),
            Duration::from_secs(30),
            Duration::from_millis(100),
        );

        let result = monitor.check_once().await;
        assert_eq!(result.status, HealthLevel::Unhealthy);
        assert_eq!(result.error.as_deref(), Some("Operation timed out after 100ms"));
    }

    #[tokio::test]
    async fn test_probe_failure_is_unhealthy() {
        let store = Arc::new(MemoryStoreClient::new());
        store.set_failing(true);
        let monitor = HealthMonitor::new(store, Duration::from_secs(30), Duration::from_secs(1));

        let result = monitor.check_once().await;
        assert_eq!(result.status, HealthLevel::Unhealthy);
        assert!(result.error.unwrap().contains("injected failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_records_until_shutdown() {
        let store = Arc::new(MemoryStoreClient::new());
        let monitor = HealthMonitor::new(store.clone(), Duration::from_secs(1), Duration::from_millis(100));
        let history = monitor.history();
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(monitor.run(rx));
        // First tick fires immediately, then once per second.
        time::sleep(Duration::from_millis(2_500)).await;
        store.set_health(HealthLevel::Degraded);
        time::sleep(Duration::from_secs(1)).await;

        tx.send(()).unwrap();
        handle.await.unwrap();

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[2].status, HealthLevel::Healthy);
        assert_eq!(history.latest().unwrap().status, HealthLevel::Degraded);
    }
}
