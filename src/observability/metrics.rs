//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, cache size, upstream outcomes)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by cache outcome and status
//! - `proxy_request_duration_seconds` (histogram): per-connection latency
//! - `cache_entries` (gauge): entries currently cached
//! - `cache_evictions_total` (counter): entries removed by the sweep
//! - `upstream_requests_total` (counter): origin fetches by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are static strings except the status code

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "proxy_requests_total";
pub const REQUEST_DURATION: &str = "proxy_request_duration_seconds";
pub const UPSTREAM_REQUESTS_TOTAL: &str = "upstream_requests_total";
pub const CACHE_ENTRIES: &str = "cache_entries";
pub const CACHE_EVICTIONS_TOTAL: &str = "cache_evictions_total";

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one served connection.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome, "status" => status.to_string())
        .increment(1);
    histogram!(REQUEST_DURATION, "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record one origin fetch.
pub fn record_upstream(outcome: &'static str) {
    counter!(UPSTREAM_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!(CACHE_ENTRIES).set(entries as f64);
}

pub fn record_evictions(evicted: usize) {
    counter!(CACHE_EVICTIONS_TOTAL).increment(evicted as u64);
}
