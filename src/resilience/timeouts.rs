//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a remote store call against a deadline
//! - Surface a distinct `TimeoutError` carrying the configured duration
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The losing future is dropped, which cancels it at its next await point;
//!   whatever it would have produced is discarded

use std::future::Future;
use std::time::Duration;

use crate::error::TimeoutError;
use crate::observability::metrics;

/// Run `op` with a deadline of `timeout`.
pub async fn with_timeout<F, Fut, T, E>(op: F, timeout: Duration) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    match tokio::time::timeout(timeout, op()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Operation timed out");
            metrics::record_timeout();
            Err(TimeoutError::new(timeout).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_timeout() {
        let result: Result<_, AppError> = with_timeout(
            || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("success")
            },
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(result.unwrap(), "success");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out() {
        let result: Result<&str, AppError> = with_timeout(
            || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok("success")
            },
            Duration::from_millis(50),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert_eq!(err.to_string(), "Operation timed out after 50ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_passes_through() {
        let result: Result<(), AppError> = with_timeout(
            || async { Err(AppError::network("connection refused", None, None)) },
            Duration::from_millis(50),
        )
        .await;

        assert!(matches!(result.unwrap_err(), AppError::Network { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loser_result_is_discarded() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result: Result<(), AppError> = with_timeout(
            || async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            },
            Duration::from_millis(50),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
