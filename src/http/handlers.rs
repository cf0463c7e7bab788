//! Local endpoints served by the gateway itself.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{Html, IntoResponse},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::health::AggregateHealth;
use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::routing::API_VERSION;

pub const GATEWAY_NAME: &str = "LLM-Frontend API Gateway";
pub const SERVICE_NAME: &str = "api-gateway";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const OPENAPI_DOCUMENT: &str = include_str!("../../assets/openapi.json");
const DOCS_PAGE: &str = include_str!("../../assets/docs.html");

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize)]
pub struct GatewayInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub api_version: &'static str,
    pub documentation: &'static str,
    pub health: &'static str,
    pub timestamp: String,
    pub request_id: String,
}

/// `GET /`
pub async fn root(State(state): State<AppState>, headers: HeaderMap) -> Json<GatewayInfo> {
    tracing::debug!(request_id = %headers.request_id(), "Root endpoint accessed");

    Json(GatewayInfo {
        name: GATEWAY_NAME,
        version: VERSION,
        environment: state.config.environment.to_string(),
        api_version: API_VERSION,
        documentation: "/docs",
        health: "/health",
        timestamp: timestamp(),
        request_id: headers.request_id().to_string(),
    })
}

/// Wire form of `/health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    #[serde(flatten)]
    pub health: AggregateHealth,
    pub service: &'static str,
    pub timestamp: String,
    pub environment: String,
    pub version: &'static str,
    pub request_id: String,
}

/// `GET /health`: 200 when every upstream is healthy, 503 otherwise.
pub async fn health(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let request_id = headers.request_id().to_string();
    let health = state.health.aggregate(&request_id, state.started_at).await;
    let status = health.http_status();

    (
        status,
        Json(HealthReport {
            health,
            service: SERVICE_NAME,
            timestamp: timestamp(),
            environment: state.config.environment.to_string(),
            version: VERSION,
            request_id,
        }),
    )
}

/// `GET /openapi.json`
pub async fn openapi() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], OPENAPI_DOCUMENT)
}

/// `GET /docs`
pub async fn docs() -> Html<&'static str> {
    Html(DOCS_PAGE)
}
