//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): rejections by limiter
//! - `gateway_upstream_health` (gauge): 1=healthy, 0=unhealthy per service
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must run inside the tokio runtime; the exporter spawns its HTTP listener there.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    describe_counter!("gateway_requests_total", Unit::Count, "Total proxied requests");
    describe_histogram!(
        "gateway_request_duration_seconds",
        Unit::Seconds,
        "Proxied request duration including upstream time"
    );
    describe_counter!(
        "gateway_rate_limited_total",
        Unit::Count,
        "Requests rejected by a rate limiter"
    );
    describe_gauge!(
        "gateway_upstream_health",
        Unit::Count,
        "Upstream health from the last probe: 1=healthy 0=unhealthy"
    );

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("service", service.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(limiter: &'static str) {
    counter!("gateway_rate_limited_total", "limiter" => limiter).increment(1);
}

pub fn record_upstream_health(service: &str, healthy: bool) {
    gauge!("gateway_upstream_health", "service" => service.to_string()).set(if healthy { 1.0 } else { 0.0 });
}
