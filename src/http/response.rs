//! Mapping application errors to HTTP responses.
//!
//! # Design Decisions
//! - Guard refusals (timeout, open circuit) become a generic 503; internal
//!   text never reaches the client
//! - Upstream and internal failures are also reported with generic text
//! - The handler's `AppError` rides along in the response extensions so the
//!   error-reporting middleware can capture it

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::AppError;
use crate::security::headers::RETRY_AFTER;

pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable";

/// JSON body of an error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            retry_after: None,
        }
    }
}

/// Status code for an error class.
pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Timeout(_) | AppError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::Authentication { .. } => StatusCode::UNAUTHORIZED,
        AppError::Authorization { .. } => StatusCode::FORBIDDEN,
        AppError::Network { .. } => StatusCode::BAD_GATEWAY,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let body = match &self {
            AppError::Timeout(_) | AppError::CircuitOpen(_) => {
                ErrorBody::new("Service Unavailable", UNAVAILABLE_MESSAGE)
            }
            AppError::RateLimitExceeded { retry_after } => ErrorBody {
                retry_after: Some(*retry_after),
                ..ErrorBody::new("Too Many Requests", self.to_string())
            },
            AppError::Validation { .. }
            | AppError::Authentication { .. }
            | AppError::Authorization { .. } => ErrorBody::new(self.name(), self.to_string()),
            AppError::Network { .. } => ErrorBody::new("Bad Gateway", "Upstream request failed"),
            AppError::Internal(_) => ErrorBody::new("Internal Server Error", "Internal server error"),
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimitExceeded { retry_after } = &self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(*retry_after));
        }
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CircuitOpenError, TimeoutError};
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Timeout(TimeoutError { timeout_ms: 10 }), 503),
            (AppError::CircuitOpen(CircuitOpenError { key: "k".into() }), 503),
            (AppError::RateLimitExceeded { retry_after: 3 }, 429),
            (AppError::validation("bad", "email", "x"), 400),
            (AppError::authentication("who", None), 401),
            (AppError::authorization("no", "doc", "write"), 403),
            (AppError::network("down", None, None), 502),
            (AppError::internal("boom"), 500),
        ];
        for (err, code) in cases {
            assert_eq!(status_for(&err).as_u16(), code, "{}", err.name());
        }
    }

    #[tokio::test]
    async fn test_guard_refusal_hides_internal_text() {
        let response = AppError::CircuitOpen(CircuitOpenError { key: "redis".into() }).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<AppError>().is_some());

        let json = body_json(response).await;
        assert_eq!(json["message"], UNAVAILABLE_MESSAGE);
        assert!(!json.to_string().contains("redis"));
    }

    #[tokio::test]
    async fn test_rate_limit_sets_retry_after() {
        let response = AppError::RateLimitExceeded { retry_after: 7 }.into_response();
        assert_eq!(response.headers()[RETRY_AFTER], "7");

        let json = body_json(response).await;
        assert_eq!(json["retryAfter"], 7);
        assert_eq!(json["message"], "Rate limit exceeded. Please try again in 7 seconds.");
    }

    #[tokio::test]
    async fn test_validation_message_is_visible() {
        let json = body_json(AppError::validation("Invalid email", "email", "x").into_response()).await;
        assert_eq!(json["error"], "ValidationError");
        assert_eq!(json["message"], "Invalid email");
    }
}
