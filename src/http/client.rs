//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Send one request to an upstream and return its response
//! - Enforce connect and per-request timeouts
//! - Bound every wait on the response body by the same timeout
//! - Reuse pooled connections per upstream authority
//!
//! # Design Decisions
//! - Forwarding sits behind the `Forwarder` trait so dispatch and health
//!   aggregation can run against an in-memory upstream in tests
//! - No retries: upstream failures surface to the caller immediately

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tower_http::timeout::TimeoutBody;

/// Failure to obtain an upstream response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

/// Capability to send a request upstream.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, ForwardError>>;
}

/// Pooled hyper client with connect and request timeouts.
#[derive(Clone)]
pub struct HyperForwarder {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl HyperForwarder {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(connector);

        Self {
            client,
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl Forwarder for HyperForwarder {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, ForwardError>> {
        let client = self.client.clone();
        let timeout = self.request_timeout;

        Box::pin(async move {
            match tokio::time::timeout(timeout, client.request(request)).await {
                Ok(Ok(response)) => Ok(bounded(response, timeout)),
                Ok(Err(e)) => Err(ForwardError::Client(e)),
                Err(_) => Err(ForwardError::Timeout(timeout)),
            }
        })
    }
}

/// A stalled body ends with an error instead of holding both sockets open.
fn bounded(response: Response<Incoming>, idle: Duration) -> Response<Body> {
    response.map(|body| Body::new(TimeoutBody::new(idle, body)))
}
