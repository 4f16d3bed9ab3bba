//! Rate-limit response metadata.
//!
//! Admitted responses carry the `X-RateLimit-*` headers; rejected requests
//! get a 429 with a JSON body and `Retry-After`.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::clock;
use crate::security::rate_limit::{RateLimitOutcome, BACKEND_NAME};

pub const LIMIT: &str = "x-ratelimit-limit";
pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET: &str = "x-ratelimit-reset";
pub const BACKEND: &str = "x-ratelimit-backend";
pub const RETRY_AFTER: &str = "retry-after";

/// Fallback `Retry-After` when the outcome has no hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitBody {
    pub error: &'static str,
    pub message: String,
    pub retry_after: u64,
}

/// Write the informative headers for `outcome` into `headers`.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, outcome: &RateLimitOutcome) {
    headers.insert(LIMIT, HeaderValue::from(outcome.limit));
    headers.insert(REMAINING, HeaderValue::from(outcome.remaining));
    if let Ok(reset) = HeaderValue::from_str(&clock::to_rfc3339(outcome.reset_time)) {
        headers.insert(RESET, reset);
    }
    headers.insert(BACKEND, HeaderValue::from_static(BACKEND_NAME));
}

/// Build the 429 response for a rejected request.
pub fn too_many_requests(outcome: &RateLimitOutcome) -> Response {
    let retry_after = outcome.retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    let body = RateLimitBody {
        error: "Too Many Requests",
        message: format!(
            "Rate limit exceeded. Please try again in {} seconds.",
            retry_after
        ),
        retry_after,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
    apply_rate_limit_headers(headers, outcome);
    response
}
