//! Outermost error boundary.
//!
//! Renders every response tagged with a `GatewayError` into the uniform JSON
//! shape, and turns handler panics into tagged 500s.

use std::any::Any;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::{ErrorResponder, ErrorTag, GatewayError};
use crate::http::request::RequestIdExt;

pub async fn error_boundary(
    State(responder): State<ErrorResponder>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request.request_id().to_string();
    let response = next.run(request).await;

    match response.extensions().get::<ErrorTag>().cloned() {
        Some(ErrorTag(error)) => responder.render(response, &error, &request_id),
        None => response,
    }
}

/// `CatchPanicLayer` handler: tag the panic so the boundary renders it.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    GatewayError::Panic(message).into_response()
}
