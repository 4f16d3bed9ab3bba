//! Startup, shutdown, and status of the resilience system.
//!
//! # Responsibilities
//! - Probe every collaborator at startup; a failing one is logged, never fatal
//! - Own the background tasks (health monitor, rate-limit sweeper)
//! - Shut everything down concurrently and wait for it to settle
//! - Fold collaborator stats into one [`SystemStatus`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::components::{
    CacheManager, ComponentError, FallbackManager, MemoryCache, MemoryFallback, MemoryPubSub,
    MemorySessions, MemoryStoreClient, PubSubManager, SessionManager, StoreClient, StoreHealth,
};
use crate::config::ResilienceConfig;
use crate::health::monitor::{HealthHistory, HealthMonitor};
use crate::health::status::{
    overall_health, CacheStatus, FallbackStatus, PubSubStatus, SessionStatus, StoreStatus,
    SystemStatus,
};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::resilience::with_timeout;
use crate::security::RateLimiter;

const COMPONENT_COUNT: usize = 5;

/// The external collaborators the orchestrator manages.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StoreClient>,
    pub cache: Arc<dyn CacheManager>,
    pub sessions: Arc<dyn SessionManager>,
    pub pubsub: Arc<dyn PubSubManager>,
    pub fallback: Arc<dyn FallbackManager>,
}

impl Collaborators {
    /// In-process implementations of every collaborator.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStoreClient::new()),
            cache: Arc::new(MemoryCache::new()),
            sessions: Arc::new(MemorySessions::new()),
            pubsub: Arc::new(MemoryPubSub::new()),
            fallback: Arc::new(MemoryFallback::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub enable_health_monitoring: bool,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub enable_fallback: bool,
}

impl InitOptions {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            enable_health_monitoring: config.health_check.enabled,
            health_check_interval: config.health_check.interval(),
            health_check_timeout: Duration::from_millis(config.health_check.timeout_ms),
            enable_fallback: config.fallback.enabled,
        }
    }
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            enable_health_monitoring: true,
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(2),
            enable_fallback: true,
        }
    }
}

/// Which collaborators answered their startup probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComponentFlags {
    pub redis: bool,
    pub cache: bool,
    pub sessions: bool,
    pub pubsub: bool,
    pub fallback: bool,
}

impl ComponentFlags {
    pub fn active_count(&self) -> usize {
        [self.redis, self.cache, self.sessions, self.pubsub, self.fallback]
            .iter()
            .filter(|active| **active)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitSummary {
    pub success: bool,
    pub components: ComponentFlags,
    pub message: String,
}

impl InitSummary {
    fn from_flags(components: ComponentFlags) -> Self {
        let active = components.active_count();
        let success = active > 0;
        let message = if success {
            format!(
                "Redis system initialized ({}/{} components active)",
                active, COMPONENT_COUNT
            )
        } else {
            "Redis system initialization failed".to_string()
        };
        Self {
            success,
            components,
            message,
        }
    }
}

pub struct ResilienceOrchestrator {
    components: Collaborators,
    rate_limiter: Option<(Arc<RateLimiter>, Duration)>,
    probe_timeout: Duration,
    shutdown: Shutdown,
    health_history: ArcSwapOption<HealthHistory>,
    started: AtomicBool,
    stopped: OnceCell<()>,
}

impl ResilienceOrchestrator {
    pub fn new(components: Collaborators) -> Self {
        Self {
            components,
            rate_limiter: None,
            probe_timeout: Duration::from_secs(2),
            shutdown: Shutdown::new(),
            health_history: ArcSwapOption::empty(),
            started: AtomicBool::new(false),
            stopped: OnceCell::new(),
        }
    }

    /// Sweep `limiter` every `cleanup_interval` while the system runs.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>, cleanup_interval: Duration) -> Self {
        self.rate_limiter = Some((limiter, cleanup_interval));
        self
    }

    /// Deadline for the store probe made by [`system_status`](Self::system_status).
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn components(&self) -> &Collaborators {
        &self.components
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref().map(|(limiter, _)| limiter)
    }

    /// Background tasks started and not yet joined.
    pub fn background_tasks(&self) -> usize {
        self.shutdown.tracked()
    }

    /// Recent health monitor results, oldest first.
    pub fn health_history(&self) -> Vec<StoreHealth> {
        match &*self.health_history.load() {
            Some(history) => history.snapshot(),
            None => Vec::new(),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.initialized()
    }

    /// Probe every collaborator and start the background tasks.
    pub async fn initialize(&self, options: InitOptions) -> InitSummary {
        let c = &self.components;
        let mut flags = ComponentFlags {
            redis: c.store.is_available(),
            ..ComponentFlags::default()
        };

        match c.cache.info().await {
            Ok(_) => flags.cache = true,
            Err(e) => tracing::warn!(error = %e, "Cache manager initialization failed"),
        }

        match c.sessions.stats().await {
            Ok(_) => flags.sessions = true,
            Err(e) => tracing::warn!(error = %e, "Session manager initialization failed"),
        }

        match c.pubsub.active_channels() {
            Ok(_) => flags.pubsub = true,
            Err(e) => tracing::warn!(error = %e, "Pub/Sub manager initialization failed"),
        }

        if options.enable_fallback {
            match c.fallback.stats().await {
                Ok(_) => flags.fallback = true,
                Err(e) => tracing::warn!(error = %e, "Fallback manager initialization failed"),
            }
        }

        if self.is_shut_down() || self.shutdown.is_triggered() {
            tracing::warn!("Initialize called after shutdown, background tasks not started");
        } else if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Background tasks already running");
        } else {
            self.start_background_tasks(&options);
        }

        let summary = InitSummary::from_flags(flags);
        tracing::info!(
            success = summary.success,
            redis = flags.redis,
            cache = flags.cache,
            sessions = flags.sessions,
            pubsub = flags.pubsub,
            fallback = flags.fallback,
            "{}",
            summary.message
        );
        summary
    }

    fn start_background_tasks(&self, options: &InitOptions) {
        if options.enable_health_monitoring {
            let monitor = HealthMonitor::new(
                self.components.store.clone(),
                options.health_check_interval,
                options.health_check_timeout,
            );
            self.health_history.store(Some(Arc::new(monitor.history())));
            let rx = self.shutdown.subscribe();
            if !self.shutdown.track("health-monitor", tokio::spawn(monitor.run(rx))) {
                return;
            }
        }

        if let Some((limiter, interval)) = &self.rate_limiter {
            let handle = limiter.spawn_sweeper(*interval, self.shutdown.subscribe());
            self.shutdown.track("rate-limit-sweeper", handle);
        }
    }

    /// Stop background tasks and shut every collaborator down.
    ///
    /// Never fails. Concurrent and repeated calls wait for the first one to finish.
    pub async fn shutdown(&self) {
        self.stopped
            .get_or_init(|| async {
                tracing::info!("Shutting down resilience system");

                let joined = self.shutdown.drain().await;
                tracing::debug!(tasks = joined, "Background tasks joined");

                let c = &self.components;
                let names = ["store", "cache", "sessions", "pubsub", "fallback"];
                let results = join_all(vec![
                    c.store.shutdown(),
                    c.cache.shutdown(),
                    c.sessions.shutdown(),
                    c.pubsub.shutdown(),
                    c.fallback.shutdown(),
                ])
                .await;

                let mut failures = 0;
                for (name, result) in names.iter().zip(results) {
                    if let Err(e) = result {
                        failures += 1;
                        tracing::error!(component = *name, error = %e, "Error during shutdown");
                    }
                }

                if failures == 0 {
                    tracing::info!("Resilience system shut down successfully");
                } else {
                    tracing::warn!(failures, "Resilience system shut down with errors");
                }
            })
            .await;
    }

    /// Current status of every collaborator. Never fails.
    pub async fn system_status(&self) -> SystemStatus {
        let status = match self.collect_status().await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get system status");
                SystemStatus::unavailable()
            }
        };
        metrics::record_overall_health(status.overall.gauge_value());
        status
    }

    async fn collect_status(&self) -> Result<SystemStatus, ComponentError> {
        let c = &self.components;
        let (cache, sessions, channels, fallback) = tokio::try_join!(
            c.cache.stats(),
            c.sessions.stats(),
            c.pubsub.channel_stats(),
            c.fallback.stats(),
        )?;

        let store = c.store.clone();
        let probe: Result<StoreHealth, ComponentError> =
            with_timeout(|| async move { store.health_check().await }, self.probe_timeout).await;
        let store_health = match probe {
            Ok(health) => Some(health),
            Err(e) => {
                tracing::debug!(error = %e, "Store health probe failed");
                None
            }
        };

        let available = c.store.is_available();
        let overall = overall_health(
            available,
            fallback.is_using_fallback,
            store_health.as_ref().map(|h| h.status),
        );

        Ok(SystemStatus {
            redis: StoreStatus {
                available,
                status: store_health,
            },
            cache: CacheStatus {
                backend: cache.backend,
                stats: cache,
            },
            sessions: SessionStatus {
                backend: sessions.backend,
                stats: sessions,
            },
            pubsub: PubSubStatus {
                channels: channels.len(),
                stats: channels,
            },
            fallback: FallbackStatus {
                active: fallback.is_using_fallback,
                stats: fallback,
            },
            overall,
        })
    }
}
