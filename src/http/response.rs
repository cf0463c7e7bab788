//! Response handling and transformation.
//!
//! # Responsibilities
//! - Transform upstream responses for the client
//! - Strip hop-by-hop headers, stamp `X-Request-ID` and `X-Service`
//!
//! # Design Decisions
//! - Status and body pass through untouched; the body streams
//! - Hop-by-hop headers stripped automatically

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Response},
};

use crate::http::request::X_REQUEST_ID;
use crate::security::headers::strip_hop_by_hop;

/// Served-by header on proxied responses.
pub const X_SERVICE: HeaderName = HeaderName::from_static("x-service");

/// Logical target service, sent upstream.
pub const X_GATEWAY_SERVICE: HeaderName = HeaderName::from_static("x-gateway-service");

/// Prepare an upstream response for the client.
pub fn finalize_upstream_response(
    mut response: Response<Body>,
    request_id: Option<&HeaderValue>,
    service: &str,
) -> Response<Body> {
    let headers = response.headers_mut();
    strip_hop_by_hop(headers);

    if let Some(value) = request_id {
        headers.insert(X_REQUEST_ID, value.clone());
    }
    if let Ok(value) = HeaderValue::from_str(service) {
        headers.insert(X_SERVICE, value);
    }
    response
}
