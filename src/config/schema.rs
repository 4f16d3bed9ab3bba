//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! resilience layer. All types derive Serde traits for deserialization from
//! config files, and every section has defaults so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// HTTP listener for the status and demo surface.
    pub listener: ListenerConfig,

    /// Defaults for the retry executor.
    pub retry: RetryConfig,

    /// Deadlines applied to remote store calls.
    pub timeouts: TimeoutConfig,

    /// Defaults for circuit breakers.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Fixed-window rate limiting per route class.
    pub rate_limit: RateLimitConfig,

    /// Error reporting pipeline.
    pub error_reporting: ErrorReportingConfig,

    /// Periodic remote store health polling.
    pub health_check: HealthCheckConfig,

    /// In-memory fallback when the remote store is unreachable.
    pub fallback: FallbackConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds.
    pub initial_delay_ms: u64,

    /// Factor applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single remote store operation in milliseconds.
    pub operation_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { operation_ms: 5000 }
    }
}

/// Circuit breaker defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
        }
    }
}

/// One fixed window: at most `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WindowLimit {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl WindowLimit {
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Interval between sweeps of expired windows, in seconds.
    pub cleanup_interval_secs: u64,

    /// General API routes.
    pub api: WindowLimit,

    /// Authentication routes.
    pub auth: WindowLimit,

    /// AI completion routes.
    pub ai: WindowLimit,

    /// Upload routes.
    pub upload: WindowLimit,

    /// Administrative routes.
    pub strict: WindowLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_interval_secs: 60,
            api: WindowLimit::new(15 * 60 * 1000, 100),
            auth: WindowLimit::new(15 * 60 * 1000, 5),
            ai: WindowLimit::new(5 * 60 * 1000, 30),
            upload: WindowLimit::new(60 * 60 * 1000, 10),
            strict: WindowLimit::new(60 * 1000, 1),
        }
    }
}

/// Error reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorReportingConfig {
    /// Remote collector URL. Reports stay local when unset.
    pub endpoint: Option<String>,

    /// Bearer token sent with remote reports.
    pub api_key: Option<String>,

    /// Fraction of errors submitted remotely, in `[0, 1]`.
    pub sample_rate: f64,

    /// Submission attempts per report.
    pub max_retries: u32,

    /// Base delay between submission attempts; grows linearly per attempt.
    pub retry_delay_ms: u64,

    /// Write every report to the local log.
    pub enable_console_logging: bool,

    /// Deployment name attached to reports.
    pub environment: String,
}

impl Default for ErrorReportingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            sample_rate: 1.0,
            max_retries: 3,
            retry_delay_ms: 1000,
            enable_console_logging: true,
            environment: "development".to_string(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable periodic health polling of the remote store.
    pub enabled: bool,

    /// Polling interval in seconds.
    pub interval_secs: u64,

    /// Deadline for a single health probe in milliseconds.
    pub timeout_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_ms: 2000,
        }
    }
}

/// Fallback cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Serve from memory when the remote store is down.
    pub enabled: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ResilienceConfig = toml::from_str("").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout_ms, 60_000);
        assert_eq!(config.rate_limit.auth, WindowLimit::new(900_000, 5));
        assert!(config.error_reporting.endpoint.is_none());
    }

    #[test]
    fn test_partial_section_override() {
        let config: ResilienceConfig = toml::from_str(
            r#"
            [rate_limit]
            enabled = false
            api = { window_ms = 1000, max_requests = 2 }

            [error_reporting]
            endpoint = "https://errors.example.com/report"
            sample_rate = 0.25
            "#,
        )
        .unwrap();

        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.api, WindowLimit::new(1000, 2));
        assert_eq!(config.rate_limit.cleanup_interval_secs, 60);
        assert_eq!(config.error_reporting.sample_rate, 0.25);
        assert_eq!(config.error_reporting.max_retries, 3);
    }
}
