//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (origin check, preflight)
//!     → rate_limit.rs (general per-IP window, then auth window on login/register)
//!     → limits.rs (body ceiling, JSON validation)
//!     → Pass to routing
//!
//! Outgoing response:
//!     → headers.rs (security headers, hop-by-hop stripping)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input; `X-Forwarded-For` is only honored when configured

pub mod cors;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use cors::CorsPolicy;
pub use limits::BodyLimit;
pub use rate_limit::{FixedWindowLimiter, RateLimitDecision, RateLimitPolicy};
