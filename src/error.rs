//! Error taxonomy shared by the resilience layer.
//!
//! The guards in [`crate::resilience`] are generic over the caller's error
//! type and only require it to absorb the errors the guards themselves raise
//! ([`TimeoutError`], [`CircuitOpenError`]). [`AppError`] is the ready-made
//! application error that does so.

use std::time::Duration;
use thiserror::Error;

/// Raised when a guarded operation misses its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Operation timed out after {timeout_ms}ms")]
pub struct TimeoutError {
    pub timeout_ms: u64,
}

impl TimeoutError {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

/// Raised when a circuit breaker refuses to call its operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit breaker is open for key: {key}")]
pub struct CircuitOpenError {
    pub key: String,
}

/// Application-level error classes.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Outbound request failed or returned an error status.
    #[error("{message}")]
    Network {
        message: String,
        status_code: Option<u16>,
        url: Option<String>,
    },

    /// Input failed validation.
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        value: Option<String>,
    },

    /// Caller could not be authenticated.
    #[error("{message}")]
    Authentication { message: String, code: Option<String> },

    /// Caller is authenticated but not allowed to act on the resource.
    #[error("{message}")]
    Authorization {
        message: String,
        resource: Option<String>,
        action: Option<String>,
    },

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Request was refused by the rate limiter.
    #[error("Rate limit exceeded. Please try again in {retry_after} seconds.")]
    RateLimitExceeded { retry_after: u64 },

    /// Anything else; also the error used when a retry loop never ran.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn network(message: impl Into<String>, status_code: Option<u16>, url: Option<&str>) -> Self {
        Self::Network {
            message: message.into(),
            status_code,
            url: url.map(str::to_string),
        }
    }

    pub fn validation(message: impl Into<String>, field: &str, value: impl ToString) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.to_string()),
            value: Some(value.to_string()),
        }
    }

    pub fn authentication(message: impl Into<String>, code: Option<&str>) -> Self {
        Self::Authentication {
            message: message.into(),
            code: code.map(str::to_string),
        }
    }

    pub fn authorization(message: impl Into<String>, resource: &str, action: &str) -> Self {
        Self::Authorization {
            message: message.into(),
            resource: Some(resource.to_string()),
            action: Some(action.to_string()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Class name used in error reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Network { .. } => "NetworkError",
            Self::Validation { .. } => "ValidationError",
            Self::Authentication { .. } => "AuthenticationError",
            Self::Authorization { .. } => "AuthorizationError",
            Self::Timeout(_) => "TimeoutError",
            Self::CircuitOpen(_) => "CircuitOpenError",
            Self::RateLimitExceeded { .. } => "RateLimitExceededError",
            Self::Internal(_) => "Error",
        }
    }

    /// True for refusals raised by the guards rather than by the operation.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::CircuitOpen(_))
    }
}

impl From<&'static str> for AppError {
    fn from(message: &'static str) -> Self {
        Self::Internal(message.to_string())
    }
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        Self::Internal(message)
    }
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
