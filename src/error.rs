//! Gateway error type and the uniform JSON error shape.
//!
//! Handlers and middleware return `GatewayError`. Its `IntoResponse` only sets
//! the status and tags the response; the error boundary middleware
//! (`http::middleware::error_boundary`) renders the final body once the
//! correlation id and environment are in hand.

use std::error::Error as _;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Environment;
use crate::http::client::ForwardError;
use crate::routing::API_VERSION;

/// Which limiter rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterKind {
    General,
    Auth,
}

impl LimiterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterKind::General => "general",
            LimiterKind::Auth => "auth",
        }
    }
}

/// Every failure the gateway can surface to a client.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("origin '{origin}' not allowed by CORS")]
    CorsNotAllowed { origin: String },

    #[error("request body contains invalid JSON")]
    InvalidJson(#[source] serde_json::Error),

    #[error("request payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("no route for '{path}'")]
    NotFound { path: String },

    #[error("{} rate limit exceeded", kind.as_str())]
    RateLimited { kind: LimiterKind },

    #[error("service '{service}' unavailable")]
    UpstreamUnavailable {
        service: String,
        #[source]
        source: ForwardError,
    },

    #[error("{message}")]
    Internal { status: StatusCode, message: String },

    #[error("handler panicked: {0}")]
    Panic(String),
}

impl GatewayError {
    pub fn internal(message: impl Into<String>) -> Self {
        GatewayError::Internal {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::CorsNotAllowed { .. } => StatusCode::FORBIDDEN,
            GatewayError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Internal { status, .. } => *status,
            GatewayError::Panic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::CorsNotAllowed { .. } => "CORS_NOT_ALLOWED",
            GatewayError::InvalidJson(_) => "INVALID_JSON",
            GatewayError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            GatewayError::NotFound { .. } => "RESOURCE_NOT_FOUND",
            GatewayError::RateLimited {
                kind: LimiterKind::General,
            } => "RATE_LIMIT_EXCEEDED",
            GatewayError::RateLimited {
                kind: LimiterKind::Auth,
            } => "AUTH_RATE_LIMIT_EXCEEDED",
            GatewayError::UpstreamUnavailable { .. } => "SERVICE_UNAVAILABLE",
            GatewayError::Internal { .. } | GatewayError::Panic(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Errors that reach the catch-all handler and get an `error_id`.
    pub fn is_unhandled(&self) -> bool {
        matches!(
            self,
            GatewayError::CorsNotAllowed { .. }
                | GatewayError::InvalidJson(_)
                | GatewayError::PayloadTooLarge { .. }
                | GatewayError::Internal { .. }
                | GatewayError::Panic(_)
        )
    }

    fn is_internal(&self) -> bool {
        matches!(self, GatewayError::Internal { .. } | GatewayError::Panic(_))
    }

    /// The error followed by its `source()` chain, one cause per line.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            out.push_str("\n    caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// Marker placed in response extensions by `GatewayError::into_response`.
#[derive(Debug, Clone)]
pub struct ErrorTag(pub Arc<GatewayError>);

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self.status_code();
        response.extensions_mut().insert(ErrorTag(Arc::new(self)));
        response
    }
}

/// Discovery links returned with 404s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableEndpoints {
    pub documentation: &'static str,
    pub health: &'static str,
    pub api: String,
}

impl Default for AvailableEndpoints {
    fn default() -> Self {
        Self {
            documentation: "/docs",
            health: "/health",
            api: format!("/api/{}", API_VERSION),
        }
    }
}

/// Wire form of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    pub code: &'static str,
    pub timestamp: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_endpoints: Option<AvailableEndpoints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Turns a `GatewayError` into the JSON body for one environment.
#[derive(Debug, Clone, Copy)]
pub struct ErrorResponder {
    environment: Environment,
}

impl ErrorResponder {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn body(&self, error: &GatewayError, request_id: &str) -> ErrorBody {
        let development = self.environment.is_development();

        let (title, detail) = match error {
            GatewayError::CorsNotAllowed { .. } => {
                ("CORS Error".to_string(), "Origin not allowed by CORS policy".to_string())
            }
            GatewayError::InvalidJson(_) => {
                ("Invalid JSON".to_string(), "Request body contains invalid JSON".to_string())
            }
            GatewayError::PayloadTooLarge { .. } => (
                "Payload too large".to_string(),
                "Request payload exceeds size limit".to_string(),
            ),
            GatewayError::NotFound { path } => (
                "Not Found".to_string(),
                format!("The requested resource '{}' was not found", path),
            ),
            GatewayError::RateLimited {
                kind: LimiterKind::General,
            } => ("Too many requests".to_string(), "Please try again later".to_string()),
            GatewayError::RateLimited {
                kind: LimiterKind::Auth,
            } => (
                "Too many authentication attempts".to_string(),
                "Please try again later".to_string(),
            ),
            GatewayError::UpstreamUnavailable { service, .. } => (
                "Service temporarily unavailable".to_string(),
                format!("{} service is not responding", service),
            ),
            GatewayError::Internal { .. } | GatewayError::Panic(_) => {
                let detail = if development {
                    error.to_string()
                } else {
                    "Something went wrong on our end".to_string()
                };
                ("Internal Server Error".to_string(), detail)
            }
        };

        ErrorBody {
            error: title,
            detail,
            code: error.code(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            request_id: request_id.to_string(),
            error_id: error.is_unhandled().then(|| Uuid::new_v4().to_string()),
            service: match error {
                GatewayError::UpstreamUnavailable { service, .. } => Some(service.clone()),
                _ => None,
            },
            available_endpoints: matches!(error, GatewayError::NotFound { .. })
                .then(AvailableEndpoints::default),
            stack: (development && error.is_internal()).then(|| error.chain()),
        }
    }

    /// Replace the body of a tagged response with the rendered JSON.
    /// Status and headers already on the response (e.g. rate-limit headers) are kept.
    pub fn render(&self, response: Response, error: &GatewayError, request_id: &str) -> Response {
        let body = self.body(error, request_id);

        if error.is_internal() {
            tracing::error!(
                request_id = %request_id,
                error_id = body.error_id.as_deref().unwrap_or_default(),
                error = %error.chain(),
                "Unhandled application error"
            );
        } else {
            tracing::debug!(request_id = %request_id, code = body.code, error = %error, "Request failed");
        }

        let (mut parts, _) = response.into_parts();
        let (json_parts, json_body) = Json(body).into_response().into_parts();

        parts.extensions.remove::<ErrorTag>();
        parts.headers.remove(header::CONTENT_LENGTH);
        parts.headers.insert(
            header::CONTENT_TYPE,
            json_parts
                .headers
                .get(header::CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("application/json")),
        );
        if json_parts.status.is_server_error() {
            // serialization failed; keep Json's 500 over the original status
            parts.status = json_parts.status;
        }

        Response::from_parts(parts, json_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unavailable() -> GatewayError {
        GatewayError::UpstreamUnavailable {
            service: "core".into(),
            source: ForwardError::Timeout(Duration::from_secs(30)),
        }
    }

    #[test]
    fn codes_and_statuses_follow_table() {
        let cases = [
            (GatewayError::CorsNotAllowed { origin: "x".into() }, 403, "CORS_NOT_ALLOWED"),
            (GatewayError::PayloadTooLarge { limit: 1 }, 413, "PAYLOAD_TOO_LARGE"),
            (GatewayError::NotFound { path: "/x".into() }, 404, "RESOURCE_NOT_FOUND"),
            (
                GatewayError::RateLimited { kind: LimiterKind::General },
                429,
                "RATE_LIMIT_EXCEEDED",
            ),
            (
                GatewayError::RateLimited { kind: LimiterKind::Auth },
                429,
                "AUTH_RATE_LIMIT_EXCEEDED",
            ),
            (unavailable(), 502, "SERVICE_UNAVAILABLE"),
            (GatewayError::internal("boom"), 500, "INTERNAL_SERVER_ERROR"),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_code().as_u16(), status);
            assert_eq!(error.code(), code);
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(GatewayError::InvalidJson(json_err).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_keeps_its_own_status() {
        let error = GatewayError::Internal {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "draining".into(),
        };
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code(), "INTERNAL_SERVER_ERROR");
    }

    #[test]
    fn internal_detail_hidden_outside_development() {
        let error = GatewayError::internal("database password leaked");

        let prod = ErrorResponder::new(Environment::Production).body(&error, "req-1");
        assert_eq!(prod.detail, "Something went wrong on our end");
        assert!(prod.stack.is_none());
        assert!(prod.error_id.is_some());

        let dev = ErrorResponder::new(Environment::Development).body(&error, "req-1");
        assert_eq!(dev.detail, "database password leaked");
        assert!(dev.stack.is_some());
    }

    #[test]
    fn upstream_body_names_service_without_raw_error() {
        let body = ErrorResponder::new(Environment::Development).body(&unavailable(), "abc");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["service"], "core");
        assert_eq!(json["detail"], "core service is not responding");
        assert_eq!(json["request_id"], "abc");
        assert!(json.get("stack").is_none());
        assert!(json.get("error_id").is_none());
        assert!(!json.to_string().contains("30s"));
    }

    #[test]
    fn not_found_lists_discovery_endpoints() {
        let error = GatewayError::NotFound { path: "/nope?x=1".into() };
        let json = serde_json::to_value(ErrorResponder::new(Environment::Test).body(&error, "id")).unwrap();

        assert_eq!(json["available_endpoints"]["documentation"], "/docs");
        assert_eq!(json["available_endpoints"]["health"], "/health");
        assert_eq!(json["available_endpoints"]["api"], "/api/v1");
        assert_eq!(json["detail"], "The requested resource '/nope?x=1' was not found");
    }

    #[test]
    fn into_response_tags_and_render_keeps_headers() {
        let mut response = GatewayError::RateLimited { kind: LimiterKind::Auth }.into_response();
        response
            .headers_mut()
            .insert("retry-after", HeaderValue::from_static("900"));
        let tag = response.extensions().get::<ErrorTag>().cloned().unwrap();

        let rendered = ErrorResponder::new(Environment::Test).render(response, &tag.0, "rid");

        assert_eq!(rendered.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rendered.headers()["retry-after"], "900");
        assert_eq!(rendered.headers()[header::CONTENT_TYPE], "application/json");
        assert!(rendered.extensions().get::<ErrorTag>().is_none());
    }
}
