//! Rate limiting middleware.
//! Applies the fixed-window limit of the request's route class.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client::{client_identifier, RouteClass};
use crate::security::headers::{apply_rate_limit_headers, too_many_requests};

pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    // 1. Disabled, or not an API path: pass through untouched.
    if !state.rate_limit.enabled {
        return next.run(req).await;
    }
    let Some(class) = RouteClass::from_path(req.uri().path()) else {
        return next.run(req).await;
    };

    // 2. Count the request against the client's window for this class.
    let client = client_identifier(req.headers());
    let key = format!("{}:{}", class.as_str(), client);
    let outcome = state
        .rate_limiter
        .check_limit(&key, class.limit(&state.rate_limit));

    if !outcome.success {
        tracing::warn!(
            client = %client,
            route_class = class.as_str(),
            retry_after = outcome.retry_after.unwrap_or_default(),
            "Rate limit exceeded"
        );
        metrics::record_rate_limited(class.as_str());
        return too_many_requests(&outcome);
    }

    // 3. Admitted: tell the client where it stands.
    let mut response = next.run(req).await;
    apply_rate_limit_headers(response.headers_mut(), &outcome);
    response
}
