//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::ResilienceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ResilienceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ResilienceConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated.
pub fn load_from_env() -> Result<ResilienceConfig, ConfigError> {
    let mut config = ResilienceConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay the knobs the hosting application passes through the environment.
///
/// `lookup` is injected so tests do not have to mutate the process environment.
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides<F>(config: &mut ResilienceConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("ERROR_REPORTING_ENDPOINT") {
        config.error_reporting.endpoint = Some(v);
    }
    if let Some(v) = lookup("ERROR_REPORTING_API_KEY") {
        config.error_reporting.api_key = Some(v);
    }
    if let Some(v) = lookup("ERROR_REPORTING_ENVIRONMENT") {
        config.error_reporting.environment = v;
    }
    override_parsed(&lookup, "ERROR_REPORTING_SAMPLE_RATE", &mut config.error_reporting.sample_rate);
    override_parsed(&lookup, "ERROR_REPORTING_MAX_RETRIES", &mut config.error_reporting.max_retries);
    override_parsed(&lookup, "ERROR_REPORTING_RETRY_DELAY_MS", &mut config.error_reporting.retry_delay_ms);
    override_parsed(&lookup, "HEALTH_CHECK_INTERVAL_SECS", &mut config.health_check.interval_secs);
    override_parsed(&lookup, "RATE_LIMIT_WINDOW_MS", &mut config.rate_limit.api.window_ms);
    override_parsed(&lookup, "RATE_LIMIT_MAX_REQUESTS", &mut config.rate_limit.api.max_requests);
}

fn override_parsed<F, T>(lookup: &F, name: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(name) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(variable = name, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ERROR_REPORTING_ENDPOINT", "https://collector.example.com/errors"),
            ("ERROR_REPORTING_SAMPLE_RATE", "0.5"),
            ("ERROR_REPORTING_MAX_RETRIES", "not-a-number"),
            ("RATE_LIMIT_MAX_REQUESTS", "42"),
        ]
        .into_iter()
        .collect();

        let mut config = ResilienceConfig::default();
        apply_env_overrides(&mut config, |name| env.get(name).map(|v| v.to_string()));

        assert_eq!(
            config.error_reporting.endpoint.as_deref(),
            Some("https://collector.example.com/errors")
        );
        assert_eq!(config.error_reporting.sample_rate, 0.5);
        assert_eq!(config.error_reporting.max_retries, 3);
        assert_eq!(config.rate_limit.api.max_requests, 42);
    }

    #[test]
    fn test_load_config_reports_validation_errors() {
        let path = std::env::temp_dir().join(format!("chat-resilience-{}.toml", std::process::id()));
        std::fs::write(&path, "[error_reporting]\nsample_rate = 2.0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("error_reporting.sample_rate"));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
