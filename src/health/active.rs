//! Active health probing.
//!
//! # Responsibilities
//! - Probe every upstream's `/health` concurrently
//! - Bound each probe by its own timeout
//! - Fold the results into one verdict

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
};
use futures_util::future::join_all;
use tokio::time;

use crate::health::state::{AggregateHealth, HealthProbeResult, HealthStatus};
use crate::http::client::Forwarder;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::routing::ServiceEndpoint;

const USER_AGENT: &str = "api-gateway-health-check";

pub struct HealthAggregator {
    forwarder: Arc<dyn Forwarder>,
    services: Vec<Arc<ServiceEndpoint>>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(forwarder: Arc<dyn Forwarder>, services: Vec<Arc<ServiceEndpoint>>, probe_timeout: Duration) -> Self {
        Self {
            forwarder,
            services,
            probe_timeout,
        }
    }

    /// Probe one service. Never fails: every problem becomes an unhealthy result.
    pub async fn probe(&self, endpoint: &ServiceEndpoint, request_id: &str) -> HealthProbeResult {
        let start = Instant::now();

        let outcome = match self.build_request(endpoint, request_id) {
            Ok(request) => match time::timeout(self.probe_timeout, self.forwarder.forward(request)).await {
                Ok(Ok(response)) if response.status().is_success() => Ok(()),
                Ok(Ok(response)) => Err(format!("unhealthy status {}", response.status())),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {:?}", self.probe_timeout)),
            },
            Err(e) => Err(e),
        };

        let response_time_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(()) => tracing::debug!(
                request_id = %request_id,
                service = %endpoint.name,
                response_time_ms,
                "Health probe succeeded"
            ),
            Err(error) => tracing::warn!(
                request_id = %request_id,
                service = %endpoint.name,
                response_time_ms,
                error = %error,
                "Health probe failed"
            ),
        }

        HealthProbeResult {
            service_name: endpoint.name.clone(),
            status: if outcome.is_ok() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            response_time_ms,
            url: endpoint.base_url.to_string(),
            error: outcome.err(),
        }
    }

    fn build_request(&self, endpoint: &ServiceEndpoint, request_id: &str) -> Result<Request<Body>, String> {
        let uri = endpoint.health_uri().map_err(|e| e.to_string())?;
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::USER_AGENT, USER_AGENT);

        if let Ok(host) = HeaderValue::from_str(&endpoint.authority()) {
            builder = builder.header(header::HOST, host);
        }
        if let Ok(id) = HeaderValue::from_str(request_id) {
            builder = builder.header(X_REQUEST_ID, id);
        }

        builder.body(Body::empty()).map_err(|e| e.to_string())
    }

    /// Probe all services concurrently; total time tracks the slowest probe.
    pub async fn check_all(&self, request_id: &str) -> Vec<HealthProbeResult> {
        let probes = self
            .services
            .iter()
            .map(|endpoint| self.probe(endpoint, request_id));
        let results = join_all(probes).await;

        for result in &results {
            metrics::record_upstream_health(&result.service_name, result.is_healthy());
        }
        results
    }

    pub async fn aggregate(&self, request_id: &str, started_at: Instant) -> AggregateHealth {
        let results = self.check_all(request_id).await;
        let health = AggregateHealth::from_results(results, started_at.elapsed().as_secs_f64());

        tracing::info!(
            request_id = %request_id,
            status = %health.status,
            uptime = health.uptime,
            service_count = health.services.len(),
            "Health check completed"
        );
        health
    }

    pub fn services(&self) -> &[Arc<ServiceEndpoint>] {
        &self.services
    }
}
