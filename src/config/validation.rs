//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, sample rate within [0, 1])
//! - Check that URLs and addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over `ResilienceConfig`

use std::net::SocketAddr;

use crate::config::schema::{ResilienceConfig, WindowLimit};

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be at least 1"));
    }
    if !(config.retry.backoff_multiplier >= 1.0) {
        errors.push(ValidationError::new(
            "retry.backoff_multiplier",
            "must be at least 1.0",
        ));
    }

    if config.timeouts.operation_ms == 0 {
        errors.push(ValidationError::new("timeouts.operation_ms", "must be positive"));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }

    let rl = &config.rate_limit;
    if rl.cleanup_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.cleanup_interval_secs",
            "must be positive",
        ));
    }
    for (name, limit) in [
        ("api", rl.api),
        ("auth", rl.auth),
        ("ai", rl.ai),
        ("upload", rl.upload),
        ("strict", rl.strict),
    ] {
        check_window(name, limit, &mut errors);
    }

    let er = &config.error_reporting;
    if !(0.0..=1.0).contains(&er.sample_rate) {
        errors.push(ValidationError::new(
            "error_reporting.sample_rate",
            format!("{} is outside [0, 1]", er.sample_rate),
        ));
    }
    if let Some(endpoint) = &er.endpoint {
        if let Err(e) = url::Url::parse(endpoint) {
            errors.push(ValidationError::new(
                "error_reporting.endpoint",
                format!("invalid URL '{}': {}", endpoint, e),
            ));
        }
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new(
            "health_check.interval_secs",
            "must be positive when health checks are enabled",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_window(name: &str, limit: WindowLimit, errors: &mut Vec<ValidationError>) {
    if limit.window_ms == 0 {
        errors.push(ValidationError::new(
            format!("rate_limit.{}.window_ms", name),
            "must be positive",
        ));
    }
    if limit.max_requests == 0 {
        errors.push(ValidationError::new(
            format!("rate_limit.{}.max_requests", name),
            "must be at least 1",
        ));
    }
}
