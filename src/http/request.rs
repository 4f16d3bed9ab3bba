//! Request identification and per-request error context.
//!
//! # Responsibilities
//! - Generate a request ID when the client did not send one
//! - Derive the error context (operation, user, session) for a request

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use chrono::Utc;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::reporting::ErrorContext;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_USER_ID: &str = "x-user-id";
pub const X_SESSION_ID: &str = "x-session-id";

/// Issues `req_<epoch millis>_<sequence>` request IDs.
#[derive(Debug, Clone, Default)]
pub struct RequestIdGenerator {
    sequence: Arc<AtomicU64>,
}

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = format!("req_{}_{}", Utc::now().timestamp_millis(), n);
        HeaderValue::try_from(id).ok().map(RequestId::new)
    }
}

/// Error context for a request: `"<METHOD> <path>"` as the operation, plus
/// user and session IDs when the client sent them.
pub fn request_context<B>(request: &Request<B>) -> ErrorContext {
    let mut context = ErrorContext::new().with_operation(format!(
        "{} {}",
        request.method(),
        request.uri().path()
    ));
    if let Some(user_id) = header_value(request.headers(), X_USER_ID) {
        context = context.with_user_id(user_id);
    }
    if let Some(session_id) = header_value(request.headers(), X_SESSION_ID) {
        context = context.with_session_id(session_id);
    }
    context
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_generated_ids_are_distinct() {
        let mut generator = RequestIdGenerator::default();
        let request = Request::new(Body::empty());

        let a = generator.make_request_id(&request).unwrap();
        let b = generator.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
        assert!(a.header_value().to_str().unwrap().starts_with("req_"));
    }

    #[test]
    fn test_request_context() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat?draft=1")
            .header(X_USER_ID, "u1")
            .header(X_SESSION_ID, "s1")
            .body(Body::empty())
            .unwrap();

        let context = request_context(&request);
        assert_eq!(context.operation.as_deref(), Some("POST /api/chat"));
        assert_eq!(context.user_id.as_deref(), Some("u1"));
        assert_eq!(context.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_request_context_without_identity() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let context = request_context(&request);
        assert_eq!(context.user_id, None);
        assert_eq!(context.session_id, None);
    }
}
