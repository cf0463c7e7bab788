//! Cross-origin request policy.
//!
//! # Responsibilities
//! - Admit or reject a request by its `Origin`
//! - Answer preflight requests directly
//! - Decorate admitted responses with the CORS response headers
//!
//! # Design Decisions
//! - Origins match exactly; `*` admits any origin but the echoed value is
//!   still the concrete origin, since credentials are allowed
//! - Rejection is a 403 `CORS_NOT_ALLOWED`, not a silent header omission

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::RequestIdExt;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Request-ID, X-API-Key";
const EXPOSE_HEADERS: &str = "X-Request-ID, X-Service, RateLimit-Limit, RateLimit-Remaining, RateLimit-Reset";

/// Compiled CORS settings.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    allow_any: bool,
    allow_missing_origin: bool,
    max_age_secs: u64,
}

impl CorsPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            allow_any: config.cors.allowed_origins.iter().any(|o| o == "*"),
            allowed_origins: config.cors.allowed_origins.clone(),
            allow_missing_origin: config.allows_missing_origin(),
            max_age_secs: config.cors.max_age_secs,
        }
    }

    /// Whether a request with this `Origin` (or none) may proceed.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => self.allow_missing_origin || self.allow_any,
            Some(origin) => self.allow_any || self.allowed_origins.iter().any(|o| o == origin),
        }
    }

    fn decorate(&self, headers: &mut HeaderMap, origin: &HeaderValue) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSE_HEADERS),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }

    fn preflight(&self, origin: &HeaderValue) -> Response {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        self.decorate(headers, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age_secs));
        response
    }
}

/// CORS middleware.
pub async fn cors(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    let origin = request.headers().get(header::ORIGIN).cloned();
    let origin_str = origin.as_ref().and_then(|v| v.to_str().ok());

    if !policy.is_allowed(origin_str) || (origin.is_some() && origin_str.is_none()) {
        let origin = origin_str.unwrap_or_default().to_string();
        tracing::warn!(
            request_id = %request.request_id(),
            origin = %origin,
            path = %request.uri().path(),
            "Origin not allowed by CORS"
        );
        return Err(GatewayError::CorsNotAllowed { origin });
    }

    let Some(origin) = origin else {
        return Ok(next.run(request).await);
    };

    let is_preflight = request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
    if is_preflight {
        return Ok(policy.preflight(&origin));
    }

    let mut response = next.run(request).await;
    policy.decorate(response.headers_mut(), &origin);
    Ok(response)
}
