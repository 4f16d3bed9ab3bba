//! Error reporting middleware.
//!
//! Server-side failures returned by handlers as [`AppError`] are captured
//! with the request's context. Client errors (validation, auth, rate limit)
//! are not reported.

use axum::{
    extract::{Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::http::request::request_context;
use crate::http::server::AppState;
use crate::reporting::LogErrorOptions;

/// True for errors worth a report.
pub fn is_reportable(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Network { .. } | AppError::Timeout(_) | AppError::CircuitOpen(_) | AppError::Internal(_)
    )
}

pub async fn error_reporting_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let context = request_context(&req);
    let url = req.uri().to_string();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = next.run(req).await;
    let status = response.status();
    let reportable = response
        .extensions()
        .get::<AppError>()
        .filter(|e| is_reportable(e))
        .cloned();

    if let Some(err) = reportable {
        let options = LogErrorOptions {
            context: Some(context),
            url: Some(url),
            user_agent,
            ..LogErrorOptions::default()
        };
        let error_id = state.reporter.log_error(&err, options).await;
        tracing::debug!(error_id = %error_id, status = %status, "Handler error reported");
    }

    response
}
