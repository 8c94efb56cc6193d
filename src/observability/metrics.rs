//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define request metrics
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `routeweave_requests_total` (counter): requests by method, status
//! - `routeweave_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "routeweave_requests_total";
pub const REQUEST_DURATION: &str = "routeweave_request_duration_seconds";

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )?
        .with_http_listener(addr)
        .install()?;

    metrics::describe_counter!(REQUESTS_TOTAL, "Total requests by method and status");
    metrics::describe_histogram!(REQUEST_DURATION, "Request latency in seconds");
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(REQUESTS_TOTAL, "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}
