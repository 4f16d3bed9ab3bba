//! In-process collaborators.
//!
//! Used by the binary when no remote store is configured, and by tests.
//! Every type has a failure switch (`set_failing`) that makes its probes and
//! stats calls fail, and records whether `shutdown` was called.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::clock::{self, Clock};
use crate::components::{
    Backend, CacheInfo, CacheManager, CacheStats, ChannelStats, ComponentError, FallbackManager,
    FallbackStats, HealthLevel, PubSubManager, SessionManager, SessionStats, StoreClient,
    StoreHealth, SyncStatus,
};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Switches {
    failing: AtomicBool,
    shut_down: AtomicBool,
}

impl Switches {
    fn check(&self, component: &'static str) -> Result<(), ComponentError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ComponentError::Failed {
                component,
                message: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn shutdown(&self, component: &'static str) -> Result<(), ComponentError> {
        self.check(component)?;
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

macro_rules! switch_accessors {
    ($ty:ty) => {
        impl $ty {
            /// Make probes, stats, and shutdown fail until cleared.
            pub fn set_failing(&self, failing: bool) {
                self.switches.failing.store(failing, Ordering::SeqCst);
            }

            pub fn is_shut_down(&self) -> bool {
                self.switches.shut_down.load(Ordering::SeqCst)
            }
        }
    };
}

/// In-process stand-in for the remote store.
pub struct MemoryStoreClient {
    available: AtomicBool,
    level: AtomicU8,
    clock: Arc<dyn Clock>,
    switches: Switches,
}

impl MemoryStoreClient {
    pub fn new() -> Self {
        Self::with_clock(clock::system())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            available: AtomicBool::new(true),
            level: AtomicU8::new(HealthLevel::Healthy.gauge_value()),
            clock,
            switches: Switches::default(),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Health level reported while available.
    pub fn set_health(&self, level: HealthLevel) {
        self.level.store(level.gauge_value(), Ordering::SeqCst);
    }

    fn health(&self) -> HealthLevel {
        match self.level.load(Ordering::SeqCst) {
            2 => HealthLevel::Healthy,
            1 => HealthLevel::Degraded,
            _ => HealthLevel::Unhealthy,
        }
    }
}

impl Default for MemoryStoreClient {
    fn default() -> Self {
        Self::new()
    }
}

switch_accessors!(MemoryStoreClient);

#[async_trait]
impl StoreClient for MemoryStoreClient {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn health_check(&self) -> Result<StoreHealth, ComponentError> {
        let started = Instant::now();
        self.switches.check("store")?;

        let (status, error) = if self.is_available() {
            (self.health(), None)
        } else {
            (HealthLevel::Unhealthy, Some("store unavailable".to_string()))
        };

        Ok(StoreHealth {
            status,
            latency_ms: started.elapsed().as_millis() as u64,
            checked_at: clock::to_rfc3339(self.clock.now_millis()),
            error,
        })
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.switches.shutdown("store")?;
        self.available.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Key/value cache with hit and miss counters.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Value>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    switches: Switches,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, ComponentError> {
        self.guard()?;
        let value = self.entries.get(key).map(|v| v.value().clone());
        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<(), ComponentError> {
        self.guard()?;
        self.entries.insert(key.into(), value);
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<bool, ComponentError> {
        self.guard()?;
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    fn guard(&self) -> Result<(), ComponentError> {
        self.switches.check("cache").inspect_err(|_| {
            self.errors.fetch_add(1, Ordering::Relaxed);
        })
    }
}

switch_accessors!(MemoryCache);

#[async_trait]
impl CacheManager for MemoryCache {
    async fn info(&self) -> Result<CacheInfo, ComponentError> {
        self.switches.check("cache")?;
        Ok(CacheInfo {
            backend: Backend::Memory,
            keys: self.entries.len(),
        })
    }

    async fn stats(&self) -> Result<CacheStats, ComponentError> {
        self.switches.check("cache")?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            backend: Backend::Memory,
        })
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.switches.shutdown("cache")?;
        self.entries.clear();
        Ok(())
    }
}

/// Session registry keyed by session id; the value is the signed-in user, if any.
#[derive(Default)]
pub struct MemorySessions {
    sessions: DashMap<String, Option<String>>,
    switches: Switches,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, session_id: impl Into<String>, user_id: Option<&str>) {
        self.sessions
            .insert(session_id.into(), user_id.map(str::to_string));
    }

    pub fn end(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }
}

switch_accessors!(MemorySessions);

#[async_trait]
impl SessionManager for MemorySessions {
    async fn stats(&self) -> Result<SessionStats, ComponentError> {
        self.switches.check("sessions")?;
        let total = self.sessions.len() as u64;
        let authenticated = self.sessions.iter().filter(|s| s.value().is_some()).count() as u64;
        Ok(SessionStats {
            total_sessions: total,
            active_sessions: total,
            guest_sessions: total - authenticated,
            authenticated_sessions: authenticated,
            backend: Backend::Memory,
        })
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.switches.shutdown("sessions")?;
        self.sessions.clear();
        Ok(())
    }
}

struct Channel {
    tx: broadcast::Sender<String>,
    published: AtomicU64,
}

/// Broadcast channels by name.
#[derive(Default)]
pub struct MemoryPubSub {
    channels: DashMap<String, Channel>,
    switches: Switches,
}

impl MemoryPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| Channel {
                tx: broadcast::channel(CHANNEL_CAPACITY).0,
                published: AtomicU64::new(0),
            })
            .tx
            .subscribe()
    }

    /// Publish to `channel`; returns how many subscribers received it.
    pub fn publish(&self, channel: &str, message: impl Into<String>) -> usize {
        match self.channels.get(channel) {
            Some(ch) => {
                ch.published.fetch_add(1, Ordering::Relaxed);
                ch.tx.send(message.into()).unwrap_or(0)
            }
            None => 0,
        }
    }
}

switch_accessors!(MemoryPubSub);

#[async_trait]
impl PubSubManager for MemoryPubSub {
    fn active_channels(&self) -> Result<Vec<String>, ComponentError> {
        self.switches.check("pubsub")?;
        let mut names: Vec<String> = self
            .channels
            .iter()
            .filter(|c| c.value().tx.receiver_count() > 0)
            .map(|c| c.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn channel_stats(&self) -> Result<Vec<ChannelStats>, ComponentError> {
        self.switches.check("pubsub")?;
        let mut stats: Vec<ChannelStats> = self
            .channels
            .iter()
            .map(|c| ChannelStats {
                channel: c.key().clone(),
                subscribers: c.value().tx.receiver_count(),
                messages_published: c.value().published.load(Ordering::Relaxed),
            })
            .collect();
        stats.sort_by(|a, b| a.channel.cmp(&b.channel));
        Ok(stats)
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.switches.shutdown("pubsub")?;
        // Dropping the senders closes every subscriber.
        self.channels.clear();
        Ok(())
    }
}

/// Local key/value store that serves while the remote store is down.
pub struct MemoryFallback {
    entries: DashMap<String, String>,
    using_fallback: AtomicBool,
    redis_available: AtomicBool,
    synced: AtomicBool,
    switches: Switches,
}

impl MemoryFallback {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            using_fallback: AtomicBool::new(false),
            redis_available: AtomicBool::new(true),
            synced: AtomicBool::new(false),
            switches: Switches::default(),
        }
    }

    /// Switch serving to (or away from) the local store.
    pub fn activate(&self, active: bool) {
        self.using_fallback.store(active, Ordering::SeqCst);
        self.redis_available.store(!active, Ordering::SeqCst);
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// Record that local entries were copied back to the remote store.
    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::SeqCst);
    }

    fn memory_usage(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| (e.key().len() + e.value().len()) as u64)
            .sum()
    }
}

impl Default for MemoryFallback {
    fn default() -> Self {
        Self::new()
    }
}

switch_accessors!(MemoryFallback);

#[async_trait]
impl FallbackManager for MemoryFallback {
    async fn stats(&self) -> Result<FallbackStats, ComponentError> {
        self.switches.check("fallback")?;
        Ok(FallbackStats {
            is_using_fallback: self.using_fallback.load(Ordering::SeqCst),
            memory_usage: self.memory_usage(),
            total_keys: self.entries.len(),
            sync_status: if self.synced.load(Ordering::SeqCst) {
                SyncStatus::Synced
            } else {
                SyncStatus::Never
            },
            redis_available: self.redis_available.load(Ordering::SeqCst),
        })
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.switches.shutdown("fallback")?;
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_client_health_follows_availability() {
        let client = MemoryStoreClient::with_clock(Arc::new(ManualClock::new(0)));
        let health = client.health_check().await.unwrap();
        assert_eq!(health.status, HealthLevel::Healthy);
        assert_eq!(health.checked_at, "1970-01-01T00:00:00.000Z");

        client.set_health(HealthLevel::Degraded);
        assert_eq!(client.health_check().await.unwrap().status, HealthLevel::Degraded);

        client.set_available(false);
        let health = client.health_check().await.unwrap();
        assert_eq!(health.status, HealthLevel::Unhealthy);
        assert!(health.error.is_some());
    }

    #[tokio::test]
    async fn test_failure_switch() {
        let client = MemoryStoreClient::new();
        client.set_failing(true);
        assert!(client.health_check().await.is_err());
        assert!(client.shutdown().await.is_err());
        assert!(!client.is_shut_down());

        client.set_failing(false);
        client.shutdown().await.unwrap();
        assert!(client.is_shut_down());
        assert!(!client.is_available());
    }

    #[tokio::test]
    async fn test_cache_counters() {
        let cache = MemoryCache::new();
        cache.set("a", json!(1)).unwrap();
        assert_eq!(cache.get("a").unwrap(), Some(json!(1)));
        assert_eq!(cache.get("b").unwrap(), None);
        assert!(cache.delete("a").unwrap());
        assert!(!cache.delete("a").unwrap());

        cache.set_failing(true);
        assert!(cache.get("a").is_err());
        cache.set_failing(false);

        let stats = cache.stats().await.unwrap();
        assert_eq!((stats.hits, stats.misses, stats.sets, stats.deletes, stats.errors), (1, 1, 1, 1, 1));
        assert_eq!(cache.info().await.unwrap().keys, 0);
    }

    #[tokio::test]
    async fn test_session_counts() {
        let sessions = MemorySessions::new();
        sessions.create("s1", Some("u1"));
        sessions.create("s2", None);
        sessions.create("s3", None);
        assert!(sessions.end("s3"));

        let stats = sessions.stats().await.unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.authenticated_sessions, 1);
        assert_eq!(stats.guest_sessions, 1);
    }

    #[tokio::test]
    async fn test_pubsub_delivery_and_stats() {
        let pubsub = MemoryPubSub::new();
        let mut rx = pubsub.subscribe("chat");
        assert_eq!(pubsub.publish("chat", "hello"), 1);
        assert_eq!(pubsub.publish("nobody", "lost"), 0);
        assert_eq!(rx.recv().await.unwrap(), "hello");

        assert_eq!(pubsub.active_channels().unwrap(), vec!["chat".to_string()]);
        let stats = pubsub.channel_stats().await.unwrap();
        assert_eq!(stats[0].subscribers, 1);
        assert_eq!(stats[0].messages_published, 1);

        pubsub.shutdown().await.unwrap();
        assert!(rx.recv().await.is_err());
        assert!(pubsub.active_channels().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_stats() {
        let fallback = MemoryFallback::new();
        fallback.set("k", "value");
        fallback.activate(true);

        let stats = fallback.stats().await.unwrap();
        assert!(stats.is_using_fallback);
        assert!(!stats.redis_available);
        assert_eq!(stats.total_keys, 1);
        assert_eq!(stats.memory_usage, 6);
        assert_eq!(stats.sync_status, SyncStatus::Never);

        fallback.mark_synced();
        assert_eq!(fallback.stats().await.unwrap().sync_status, SyncStatus::Synced);
        assert_eq!(fallback.get("k").as_deref(), Some("value"));
    }
}
