//! Reverse proxy dispatch.
//!
//! # Responsibilities
//! - Resolve the route for a request (404 when none matches)
//! - Rewrite the outbound request: URI, `Host`, forwarding headers
//! - Forward through the `Forwarder` and map failures to 502
//!
//! # Design Decisions
//! - No retries; an upstream failure is reported on the first attempt
//! - A drop guard logs every exit path, including client disconnects
//! - The raw network error is logged, never returned to the client

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, Version},
    response::Response,
};

use crate::error::GatewayError;
use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::http::response::{finalize_upstream_response, X_GATEWAY_SERVICE};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::headers::strip_hop_by_hop;
use crate::security::limits::is_length_limit;

enum Outcome {
    Pending,
    Responded(u16),
    Failed(u16),
}

/// Logs the forward on drop, whichever way the request ended.
struct ForwardSpan {
    request_id: String,
    service: String,
    method: Method,
    path: String,
    start: Instant,
    outcome: Outcome,
}

impl ForwardSpan {
    fn new(ctx: &RequestContext, service: &str) -> Self {
        Self {
            request_id: ctx.correlation_id.clone(),
            service: service.to_string(),
            method: ctx.method.clone(),
            path: ctx.path.clone(),
            start: ctx.received_at,
            outcome: Outcome::Pending,
        }
    }
}

impl Drop for ForwardSpan {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let status = match self.outcome {
            Outcome::Responded(status) => {
                tracing::info!(
                    request_id = %self.request_id,
                    service = %self.service,
                    method = %self.method,
                    path = %self.path,
                    status,
                    elapsed_ms,
                    "Proxy response"
                );
                status
            }
            Outcome::Failed(status) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    service = %self.service,
                    method = %self.method,
                    path = %self.path,
                    status,
                    elapsed_ms,
                    "Proxy request failed"
                );
                status
            }
            Outcome::Pending => {
                tracing::info!(
                    request_id = %self.request_id,
                    service = %self.service,
                    method = %self.method,
                    path = %self.path,
                    elapsed_ms,
                    "Client went away before upstream responded"
                );
                499
            }
        };
        metrics::record_request(self.method.as_str(), status, &self.service, self.start);
    }
}

/// Fallback handler: everything that is not a local endpoint.
pub async fn proxy(State(state): State<AppState>, request: Request<Body>) -> Result<Response, GatewayError> {
    let (mut parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts, state.config.rate_limit.trust_forwarded_for);

    let Some(route) = state.router.match_path(&ctx.path) else {
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| ctx.path.clone());
        tracing::warn!(
            request_id = %ctx.correlation_id,
            method = %ctx.method,
            path = %path,
            "Route not found"
        );
        return Err(GatewayError::NotFound { path });
    };
    let service = route.target.name.as_str();

    let mut path_and_query = route.rewrite_path(&ctx.path);
    if let Some(query) = parts.uri.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }
    let uri = route
        .target
        .upstream_uri(&path_and_query)
        .map_err(|e| GatewayError::internal(format!("cannot build upstream uri for '{}': {}", service, e)))?;

    let headers = &mut parts.headers;
    strip_hop_by_hop(headers);
    headers.remove(header::HOST);
    if let Ok(host) = HeaderValue::from_str(&route.target.authority()) {
        headers.insert(header::HOST, host);
    }
    if let Some(id) = &ctx.correlation_header {
        headers.insert(X_REQUEST_ID, id.clone());
    }
    if let Some(ip) = ctx.client_ip {
        if let Ok(value) = HeaderValue::from_str(&ip.to_string()) {
            headers.insert("x-forwarded-for", value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(service) {
        headers.insert(X_GATEWAY_SERVICE, value);
    }

    parts.uri = uri;
    parts.version = Version::HTTP_11;

    tracing::debug!(
        request_id = %ctx.correlation_id,
        service = %service,
        method = %ctx.method,
        original_path = %ctx.path,
        target = %parts.uri,
        "Proxying request"
    );

    let mut span = ForwardSpan::new(&ctx, service);

    match state.forwarder.forward(Request::from_parts(parts, body)).await {
        Ok(response) => {
            span.outcome = Outcome::Responded(response.status().as_u16());
            Ok(finalize_upstream_response(response, ctx.correlation_header.as_ref(), service))
        }
        Err(e) if is_length_limit(&e) => {
            span.outcome = Outcome::Failed(413);
            Err(GatewayError::PayloadTooLarge {
                limit: state.config.security.max_body_bytes,
            })
        }
        Err(e) => {
            tracing::error!(
                request_id = %ctx.correlation_id,
                service = %service,
                target = %route.target.base_url,
                error = %e,
                "Proxy error"
            );
            span.outcome = Outcome::Failed(502);
            Err(GatewayError::UpstreamUnavailable {
                service: service.to_string(),
                source: e,
            })
        }
    }
}
