//! Request identification and per-request context.
//!
//! # Responsibilities
//! - Generate the correlation id (UUID v4) when the client sent none
//! - Read the correlation id back anywhere downstream
//! - Derive the client address used for rate limiting and `X-Forwarded-For`
//!
//! # Design Decisions
//! - An inbound `X-Request-ID` is reused verbatim; tower-http's
//!   `SetRequestIdLayer` only calls the generator when the header is absent
//! - Request ID added as early as possible for tracing

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::{
    extract::ConnectInfo,
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Correlation header carried on inbound, outbound and response messages.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Placeholder when no correlation id could be read.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Generates a fresh UUID v4 correlation id.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeCorrelationId;

impl MakeRequestId for MakeCorrelationId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Access to the correlation id of a request.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(UNKNOWN_REQUEST_ID)
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers().request_id()
    }
}

/// Client address: first `X-Forwarded-For` hop when trusted, else the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    peer.map(|addr| addr.ip())
}

/// Peer address recorded by `into_make_service_with_connect_info`.
pub fn peer_addr(extensions: &axum::http::Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// The correlation id exactly as assigned, bytes untouched.
pub fn correlation_header(parts: &Parts) -> Option<HeaderValue> {
    parts
        .extensions
        .get::<RequestId>()
        .map(|id| id.header_value().clone())
        .or_else(|| parts.headers.get(X_REQUEST_ID).cloned())
}

/// Per-request facts captured at dispatch time.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Printable form, for logs.
    pub correlation_id: String,
    /// Value propagated on the outbound request and the response.
    pub correlation_header: Option<HeaderValue>,
    pub received_at: Instant,
    pub method: Method,
    pub path: String,
    pub client_ip: Option<IpAddr>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts, trust_forwarded_for: bool) -> Self {
        let correlation_header = correlation_header(parts);
        let correlation_id = correlation_header
            .as_ref()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string());
        Self {
            correlation_id,
            correlation_header,
            received_at: Instant::now(),
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            client_ip: client_ip(&parts.headers, peer_addr(&parts.extensions), trust_forwarded_for),
        }
    }

    /// Rate-limit key and `X-Forwarded-For` value.
    pub fn client_key(&self) -> String {
        self.client_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
