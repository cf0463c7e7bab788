//! Request body limits and JSON validation.
//!
//! # Responsibilities
//! - Reject declared bodies above the ceiling before reading them
//! - Buffer and validate JSON bodies; the top level must be an object or array
//! - Cap streamed bodies of other content types
//!
//! # Design Decisions
//! - Limits checked before full parsing (early rejection)
//! - Valid JSON is forwarded as the exact bytes received, never re-serialized
//! - Non-JSON bodies stream; overrunning the cap mid-stream fails the
//!   upstream write, which the dispatcher maps back to 413

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::IgnoredAny;

use crate::error::GatewayError;

/// Maximum accepted request body size in bytes.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// `application/json` or any `+json` media type.
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// True when `error` or one of its causes is a body length overrun.
pub fn is_length_limit(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Well-formed JSON whose top-level value is an object or array.
fn validate_json(bytes: &[u8]) -> Result<(), serde_json::Error> {
    serde_json::from_slice::<IgnoredAny>(bytes)?;
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => Ok(()),
        _ => Err(serde::de::Error::custom(
            "top-level JSON value must be an object or array",
        )),
    }
}

/// Body check middleware.
pub async fn body_limits(
    State(BodyLimit(limit)): State<BodyLimit>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    if declared_length(request.headers()).is_some_and(|len| len > limit as u64) {
        return Err(GatewayError::PayloadTooLarge { limit });
    }

    let (parts, body) = request.into_parts();

    let body = if is_json_content_type(&parts.headers) {
        let bytes = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if is_length_limit(e.as_ref()) => {
                return Err(GatewayError::PayloadTooLarge { limit });
            }
            Err(e) => {
                return Err(GatewayError::Internal {
                    status: StatusCode::BAD_REQUEST,
                    message: format!("failed to read request body: {}", e),
                });
            }
        };

        if !bytes.is_empty() {
            validate_json(&bytes).map_err(GatewayError::InvalidJson)?;
        }
        Body::from(bytes)
    } else {
        Body::new(Limited::new(body, limit))
    };

    Ok(next.run(Request::from_parts(parts, body)).await)
}
