//! Health verdicts.
//!
//! # States
//! - Per service: healthy (2xx within the probe timeout) or unhealthy
//! - Overall: healthy iff every probed service is healthy, else degraded
//!
//! # Design Decisions
//! - Nothing here is cached; every `/health` call derives a fresh verdict
//! - Services are keyed in a sorted map so output order is stable

use std::collections::BTreeMap;
use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;

/// Result of probing one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Verdict over all services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Healthy => f.write_str("healthy"),
            OverallStatus::Degraded => f.write_str("degraded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthProbeResult {
    #[serde(skip)]
    pub service_name: String,
    pub status: HealthStatus,
    #[serde(rename = "response_time")]
    pub response_time_ms: u64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthProbeResult {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateHealth {
    pub status: OverallStatus,
    pub services: BTreeMap<String, HealthProbeResult>,
    /// Process uptime in seconds.
    pub uptime: f64,
}

impl AggregateHealth {
    pub fn from_results(results: Vec<HealthProbeResult>, uptime: f64) -> Self {
        let status = if results.iter().all(HealthProbeResult::is_healthy) {
            OverallStatus::Healthy
        } else {
            OverallStatus::Degraded
        };

        Self {
            status,
            services: results
                .into_iter()
                .map(|r| (r.service_name.clone(), r))
                .collect(),
            uptime,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self.status {
            OverallStatus::Healthy => StatusCode::OK,
            OverallStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
