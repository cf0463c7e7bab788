//! Request spans.
//!
//! # Responsibilities
//! - Open one span per inbound request carrying the correlation id
//! - Log completion with status and latency
//!
//! # Design Decisions
//! - The span is created after the correlation id layer, so the id is
//!   always present on every event emitted while handling the request

use axum::http::Request;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{DefaultOnRequest, DefaultOnResponse, MakeSpan, TraceLayer},
    LatencyUnit,
};
use tracing::{Level, Span};

use crate::http::request::RequestIdExt;

/// Span maker tagging each request with its correlation id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            request_id = %request.request_id(),
            method = %request.method(),
            uri = %request.uri(),
        )
    }
}

pub type GatewayTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, DefaultOnResponse>;

pub fn trace_layer() -> GatewayTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}
