//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup, first match wins)
//!     → matcher.rs (segment-aware prefix match)
//!     → Return: matched RouteEntry or NoMatch
//!
//! Route Compilation (at startup):
//!     ServiceConfig[]
//!     → /api/v1/{name} routes, then legacy /api/{name} routes
//!     → Freeze as immutable Router
//! ```

pub mod matcher;
pub mod router;

pub use router::{RouteEntry, Router, ServiceEndpoint, API_VERSION};
