//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (correlation id, client address, RequestContext)
//!     → handlers.rs (/, /health, /docs, /openapi.json)
//!       or proxy.rs (route lookup → client.rs → upstream)
//!     → response.rs (strip hop-by-hop, stamp X-Request-ID / X-Service)
//!     → middleware/error_boundary.rs (uniform JSON errors)
//!     → Send to client
//! ```

pub mod client;
pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use client::{ForwardError, Forwarder, HyperForwarder};
pub use request::{RequestContext, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
