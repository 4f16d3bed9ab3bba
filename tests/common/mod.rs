//! Shared harness for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use axum::Router;

use chat_resilience::components::{
    MemoryCache, MemoryFallback, MemoryPubSub, MemorySessions, MemoryStoreClient,
};
use chat_resilience::config::{ResilienceConfig, WindowLimit};
use chat_resilience::http::{AppState, HttpServer};
use chat_resilience::lifecycle::Collaborators;
use chat_resilience::reporting::{ErrorContextStore, ErrorReporter};
use chat_resilience::security::RateLimiter;
use chat_resilience::ResilienceOrchestrator;

/// In-memory collaborators with handles kept for fault injection.
pub struct Harness {
    pub store: Arc<MemoryStoreClient>,
    pub cache: Arc<MemoryCache>,
    pub fallback: Arc<MemoryFallback>,
    pub rate_limiter: Arc<RateLimiter>,
    pub orchestrator: Arc<ResilienceOrchestrator>,
    pub app: Router,
}

impl Harness {
    pub fn new(config: &ResilienceConfig) -> Self {
        let store = Arc::new(MemoryStoreClient::new());
        let cache = Arc::new(MemoryCache::new());
        let fallback = Arc::new(MemoryFallback::new());
        let components = Collaborators {
            store: store.clone(),
            cache: cache.clone(),
            sessions: Arc::new(MemorySessions::new()),
            pubsub: Arc::new(MemoryPubSub::new()),
            fallback: fallback.clone(),
        };

        let rate_limiter = Arc::new(RateLimiter::new());
        let orchestrator = Arc::new(
            ResilienceOrchestrator::new(components)
                .with_rate_limiter(rate_limiter.clone(), Duration::from_secs(60)),
        );
        let reporter = ErrorReporter::new(config.error_reporting.clone(), ErrorContextStore::new())
            .with_await_submission(true);

        let state = AppState::new(config, orchestrator.clone(), rate_limiter.clone(), Arc::new(reporter));
        let app = HttpServer::new(state, Duration::from_secs(5)).router();

        Self {
            store,
            cache,
            fallback,
            rate_limiter,
            orchestrator,
            app,
        }
    }
}

/// Config with short retry delays and a low breaker threshold.
pub fn fast_config() -> ResilienceConfig {
    let mut config = ResilienceConfig::default();
    config.retry.max_attempts = 2;
    config.retry.initial_delay_ms = 1;
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.reset_timeout_ms = 60_000;
    config.rate_limit.api = WindowLimit::new(60_000, 100);
    config.error_reporting.max_retries = 1;
    config.error_reporting.retry_delay_ms = 1;
    config
}

pub fn get(uri: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .header("user-agent", "integration-test")
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
