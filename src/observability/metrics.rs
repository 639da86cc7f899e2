//! Prometheus metrics for the engine.
//!
//! Provides metrics for request throughput, detection pipeline outcomes,
//! backend circuit breaker state, and response rewriting.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Global Prometheus handle for the metrics endpoint.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &seconds_from_ms(&config.latency_buckets_ms),
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    let handle = builder.install_recorder().map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

#[cfg(feature = "prometheus")]
fn seconds_from_ms(ms_buckets: &[f64]) -> Vec<f64> {
    ms_buckets.iter().map(|ms| ms / 1000.0).collect()
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record a request handled at a listener, after routing to a host.
pub fn record_http_request(host: &str, status: u16, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        let status_str = status.to_string();
        let status_class = format!("{}xx", status / 100);

        counter!("rampart_requests_total", "host" => host.to_string(), "status" => status_str, "status_class" => status_class.clone())
            .increment(1);
        histogram!("rampart_request_duration_seconds", "host" => host.to_string(), "status_class" => status_class)
            .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (host, status, duration_secs);
    }
}

/// Record the outcome of the detection pipeline for one request.
pub fn record_detection_result(host: &str, rule_name: &str, blocked: bool) {
    #[cfg(feature = "prometheus")]
    {
        counter!("rampart_detection_total", "host" => host.to_string(), "rule" => rule_name.to_string(), "blocked" => blocked.to_string())
            .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (host, rule_name, blocked);
    }
}

/// Record an unresolved-host rejection (no HostSafe matched the request).
pub fn record_unresolved_host(host_header: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("rampart_unresolved_host_total", "host" => host_header.to_string()).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = host_header;
    }
}

/// Record a proxied request's upstream latency and outcome.
pub fn record_upstream_request(host: &str, backend: &str, success: bool, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("rampart_upstream_requests_total", "host" => host.to_string(), "backend" => backend.to_string(), "success" => success.to_string())
            .increment(1);
        histogram!("rampart_upstream_duration_seconds", "host" => host.to_string(), "backend" => backend.to_string())
            .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (host, backend, success, duration_secs);
    }
}

/// Record a circuit breaker state transition for a backend.
pub fn record_circuit_breaker_state(backend: &str, state: &str) {
    #[cfg(feature = "prometheus")]
    {
        gauge!("rampart_circuit_breaker_state", "backend" => backend.to_string(), "state" => state.to_string()).set(1.0);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (backend, state);
    }
}

/// Record a response rewrite pass (LDP masking / compression).
pub fn record_response_rewrite(host: &str, masked: bool, compressed: bool) {
    #[cfg(feature = "prometheus")]
    {
        counter!("rampart_response_rewrites_total", "host" => host.to_string(), "masked" => masked.to_string(), "compressed" => compressed.to_string())
            .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (host, masked, compressed);
    }
}

/// Set the current number of live proxied connections.
pub fn set_active_connections(count: usize) {
    #[cfg(feature = "prometheus")]
    {
        gauge!("rampart_active_connections").set(count as f64);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = count;
    }
}

/// Record that a request panicked inside the handler and was recovered.
pub fn record_panic_recovered(host: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("rampart_panics_recovered_total", "host" => host.to_string()).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = host;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
