//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the status handlers
//! - Wire up middleware (request ID, tracing, timeout, error reporting, rate limiting)
//! - Serve on a listener until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::components::{HealthLevel, StoreHealth};
use crate::config::{RateLimitConfig, ResilienceConfig};
use crate::error::AppError;
use crate::http::middleware::{error_reporting_middleware, rate_limit_middleware};
use crate::http::request::{RequestIdGenerator, X_REQUEST_ID};
use crate::lifecycle::ResilienceOrchestrator;
use crate::reporting::ErrorReporter;
use crate::resilience::{CircuitBreakerRegistry, GuardPolicy};
use crate::security::RateLimiter;

/// Circuit key of the remote store.
pub const STORE_CIRCUIT: &str = "redis";

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ResilienceOrchestrator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub rate_limit: Arc<RateLimitConfig>,
    pub reporter: Arc<ErrorReporter>,
    pub store_guard: GuardPolicy,
}

impl AppState {
    pub fn new(
        config: &ResilienceConfig,
        orchestrator: Arc<ResilienceOrchestrator>,
        rate_limiter: Arc<RateLimiter>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self {
            orchestrator,
            rate_limiter,
            rate_limit: Arc::new(config.rate_limit.clone()),
            reporter,
            store_guard: GuardPolicy::from_config(STORE_CIRCUIT, CircuitBreakerRegistry::new(), config),
        }
    }
}

/// HTTP front of the resilience layer.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            router: Self::build_router(state, request_timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(liveness))
            .route("/status", get(system_status))
            .route("/api/store/health", get(store_health))
            .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
            .layer(from_fn_with_state(state.clone(), error_reporting_middleware))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, RequestIdGenerator::default()))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then finish in-flight requests.
    pub async fn run<S>(self, listener: TcpListener, shutdown: S) -> Result<(), std::io::Error>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Full system status; 503 while the system is unhealthy.
async fn system_status(State(state): State<AppState>) -> Response {
    let status = state.orchestrator.system_status().await;
    let code = if status.overall == HealthLevel::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(status)).into_response()
}

/// Store probe through the standard guard stack.
async fn store_health(State(state): State<AppState>) -> Result<Json<StoreHealth>, AppError> {
    let store = state.orchestrator.components().store.clone();
    let health = state
        .store_guard
        .run(|| {
            let store = store.clone();
            async move { store.health_check().await.map_err(AppError::from) }
        })
        .await?;
    Ok(Json(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowLimit;
    use crate::lifecycle::Collaborators;
    use crate::reporting::ErrorContextStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(config: &ResilienceConfig) -> AppState {
        let orchestrator = Arc::new(ResilienceOrchestrator::new(Collaborators::in_memory()));
        let reporter = ErrorReporter::new(config.error_reporting.clone(), ErrorContextStore::new());
        AppState::new(config, orchestrator, Arc::new(RateLimiter::new()), Arc::new(reporter))
    }

    fn router(config: &ResilienceConfig) -> Router {
        HttpServer::new(state(config), Duration::from_secs(5)).router()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_liveness_carries_request_id() {
        let response = router(&ResilienceConfig::default())
            .oneshot(get("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        assert!(id.starts_with("req_"));
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    #[tokio::test]
    async fn test_client_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/health")
            .header(X_REQUEST_ID, "client-supplied")
            .body(Body::empty())
            .unwrap();
        let response = router(&ResilienceConfig::default()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "client-supplied");
    }

    #[tokio::test]
    async fn test_status_reports_healthy_system() {
        let response = router(&ResilienceConfig::default())
            .oneshot(get("/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["overall"], "healthy");
        assert_eq!(json["redis"]["available"], true);
    }

    #[tokio::test]
    async fn test_api_route_is_rate_limited() {
        let mut config = ResilienceConfig::default();
        config.rate_limit.api = WindowLimit::new(60_000, 2);
        let app = router(&config);

        for remaining in ["1", "0"] {
            let response = app.clone().oneshot(get("/api/store/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-ratelimit-limit"], "2");
            assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
        }

        let response = app.oneshot(get("/api/store/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn test_disabled_rate_limit_adds_no_headers() {
        let mut config = ResilienceConfig::default();
        config.rate_limit.enabled = false;
        let response = router(&config).oneshot(get("/api/store/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}
