//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rls_route_decisions_total` (counter): channel picks by `outcome`
//!   (`rule`, `default`, `fallback`)
//! - `storage_requests_total` (counter): data RPCs by `op` and `outcome`
//!   (`ok` or a storage error code)
//! - `storage_request_duration_seconds` (histogram): data RPC latency by `op`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus recorder is installed on demand and rendered to text,
//!   there is no scrape endpoint

use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::debug!("Prometheus recorder installed");
    Ok(handle)
}

/// Record how the data channel picked a target.
pub fn record_route_decision(outcome: &'static str) {
    metrics::counter!("rls_route_decisions_total", "outcome" => outcome).increment(1);
}

/// Record one data RPC.
pub fn record_storage_request(op: &'static str, outcome: &'static str, start: Instant) {
    metrics::counter!("storage_requests_total", "op" => op, "outcome" => outcome).increment(1);
    metrics::histogram!("storage_request_duration_seconds", "op" => op).record(start.elapsed().as_secs_f64());
}
