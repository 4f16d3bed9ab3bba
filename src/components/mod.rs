//! External collaborators managed by the orchestrator.
//!
//! # Data Flow
//! ```text
//! ResilienceOrchestrator
//!     → StoreClient      (remote store availability + health probe)
//!     → CacheManager     (cache info and counters)
//!     → SessionManager   (session counts)
//!     → PubSubManager    (channel list and per-channel stats)
//!     → FallbackManager  (in-memory fallback state)
//! ```
//!
//! # Design Decisions
//! - Each collaborator is a trait object so deployments can plug in a real
//!   remote store; `memory.rs` provides the in-process implementations
//! - Every collaborator can be shut down; shutdown errors are reported, not fatal

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AppError, TimeoutError};

pub mod memory;

pub use memory::{MemoryCache, MemoryFallback, MemoryPubSub, MemorySessions, MemoryStoreClient};

/// Where a collaborator keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Redis,
    Memory,
    Hybrid,
}

/// Coarse health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthLevel {
    /// Gauge encoding: 2 healthy, 1 degraded, 0 unhealthy.
    pub fn gauge_value(&self) -> u8 {
        match self {
            Self::Healthy => 2,
            Self::Degraded => 1,
            Self::Unhealthy => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Collaborator failures.
#[derive(Debug, Clone, Error)]
pub enum ComponentError {
    #[error("{component} failed: {message}")]
    Failed {
        component: &'static str,
        message: String,
    },

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl From<ComponentError> for AppError {
    fn from(err: ComponentError) -> Self {
        match err {
            ComponentError::Timeout(e) => AppError::Timeout(e),
            other => AppError::network(other.to_string(), None, None),
        }
    }
}

/// Result of one remote store health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    pub status: HealthLevel,
    pub latency_ms: u64,
    /// RFC 3339 time of the probe.
    pub checked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub backend: Backend,
    pub keys: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub backend: Backend,
}

impl CacheStats {
    pub fn empty(backend: Backend) -> Self {
        Self {
            hits: 0,
            misses: 0,
            sets: 0,
            deletes: 0,
            errors: 0,
            backend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: u64,
    pub active_sessions: u64,
    pub guest_sessions: u64,
    pub authenticated_sessions: u64,
    pub backend: Backend,
}

impl SessionStats {
    pub fn empty(backend: Backend) -> Self {
        Self {
            total_sessions: 0,
            active_sessions: 0,
            guest_sessions: 0,
            authenticated_sessions: 0,
            backend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub channel: String,
    pub subscribers: usize,
    pub messages_published: u64,
}

/// Progress of copying fallback data back to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Never,
    Syncing,
    Synced,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackStats {
    pub is_using_fallback: bool,
    /// Approximate bytes held by the fallback store.
    pub memory_usage: u64,
    pub total_keys: usize,
    pub sync_status: SyncStatus,
    pub redis_available: bool,
}

#[async_trait]
pub trait StoreClient: Send + Sync {
    fn is_available(&self) -> bool;

    async fn health_check(&self) -> Result<StoreHealth, ComponentError>;

    async fn shutdown(&self) -> Result<(), ComponentError>;
}

#[async_trait]
pub trait CacheManager: Send + Sync {
    async fn info(&self) -> Result<CacheInfo, ComponentError>;

    async fn stats(&self) -> Result<CacheStats, ComponentError>;

    async fn shutdown(&self) -> Result<(), ComponentError>;
}

#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn stats(&self) -> Result<SessionStats, ComponentError>;

    async fn shutdown(&self) -> Result<(), ComponentError>;
}

#[async_trait]
pub trait PubSubManager: Send + Sync {
    fn active_channels(&self) -> Result<Vec<String>, ComponentError>;

    async fn channel_stats(&self) -> Result<Vec<ChannelStats>, ComponentError>;

    async fn shutdown(&self) -> Result<(), ComponentError>;
}

#[async_trait]
pub trait FallbackManager: Send + Sync {
    async fn stats(&self) -> Result<FallbackStats, ComponentError>;

    async fn shutdown(&self) -> Result<(), ComponentError>;
}
