//! Aggregated system status.
//!
//! # Overall Health
//! ```text
//! store unavailable, fallback inactive → unhealthy
//! store unavailable, fallback active   → degraded
//! store available                      → the store's own reported level
//!                                        (healthy when no probe result)
//! ```

use serde::{Deserialize, Serialize};

use crate::components::{
    Backend, CacheStats, ChannelStats, FallbackStats, HealthLevel, SessionStats, StoreHealth,
    SyncStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StoreHealth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub backend: Backend,
    pub stats: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub backend: Backend,
    pub stats: SessionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubStatus {
    pub channels: usize,
    pub stats: Vec<ChannelStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackStatus {
    pub active: bool,
    pub stats: FallbackStats,
}

/// Snapshot of every collaborator plus the derived overall level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub redis: StoreStatus,
    pub cache: CacheStatus,
    pub sessions: SessionStatus,
    pub pubsub: PubSubStatus,
    pub fallback: FallbackStatus,
    pub overall: HealthLevel,
}

impl SystemStatus {
    /// Zeroed status returned when collection fails.
    pub fn unavailable() -> Self {
        Self {
            redis: StoreStatus {
                available: false,
                status: None,
            },
            cache: CacheStatus {
                backend: Backend::Memory,
                stats: CacheStats::empty(Backend::Memory),
            },
            sessions: SessionStatus {
                backend: Backend::Memory,
                stats: SessionStats::empty(Backend::Memory),
            },
            pubsub: PubSubStatus {
                channels: 0,
                stats: Vec::new(),
            },
            fallback: FallbackStatus {
                active: true,
                stats: FallbackStats {
                    is_using_fallback: true,
                    memory_usage: 0,
                    total_keys: 0,
                    sync_status: SyncStatus::Never,
                    redis_available: false,
                },
            },
            overall: HealthLevel::Unhealthy,
        }
    }
}

/// Derive the overall level from store availability, fallback state, and the
/// store's last probe.
pub fn overall_health(
    store_available: bool,
    fallback_active: bool,
    store_health: Option<HealthLevel>,
) -> HealthLevel {
    match (store_available, fallback_active) {
        (false, false) => HealthLevel::Unhealthy,
        (false, true) => HealthLevel::Degraded,
        (true, _) => store_health.unwrap_or(HealthLevel::Healthy),
    }
}
