//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_rate_limited_total` (counter): rejected requests by route class
//! - `resilience_circuit_opened_total` (counter): closed→open transitions by key
//! - `resilience_circuit_rejected_total` (counter): calls refused while open, by key
//! - `resilience_retry_attempts_total` (counter): retries after a failed attempt
//! - `resilience_timeouts_total` (counter): operations abandoned by the timeout guard
//! - `resilience_errors_reported_total` (counter): captured errors by class
//! - `resilience_rate_limit_entries` (gauge): live limiter entries after a sweep
//! - `resilience_overall_health` (gauge): 2=healthy, 1=degraded, 0=unhealthy
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is installed only by the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_rate_limited(route_class: &'static str) {
    ::metrics::counter!("resilience_rate_limited_total", "route_class" => route_class).increment(1);
}

pub fn record_circuit_opened(key: &str) {
    ::metrics::counter!("resilience_circuit_opened_total", "key" => key.to_string()).increment(1);
}

pub fn record_circuit_rejected(key: &str) {
    ::metrics::counter!("resilience_circuit_rejected_total", "key" => key.to_string()).increment(1);
}

pub fn record_retry() {
    ::metrics::counter!("resilience_retry_attempts_total").increment(1);
}

pub fn record_timeout() {
    ::metrics::counter!("resilience_timeouts_total").increment(1);
}

pub fn record_error_reported(kind: &str) {
    ::metrics::counter!("resilience_errors_reported_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_rate_limit_entries(entries: usize) {
    ::metrics::gauge!("resilience_rate_limit_entries").set(entries as f64);
}

/// Record the overall health level as 2 (healthy), 1 (degraded) or 0 (unhealthy).
pub fn record_overall_health(level: u8) {
    ::metrics::gauge!("resilience_overall_health").set(f64::from(level));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_rate_limited("api");
        record_circuit_opened("db");
        record_circuit_rejected("db");
        record_retry();
        record_timeout();
        record_error_reported("NetworkError");
        record_rate_limit_entries(3);
        record_overall_health(2);
    }
}
