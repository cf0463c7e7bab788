//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → active.rs (probe every upstream concurrently, per-probe timeout)
//!     → state.rs (fold into healthy / degraded)
//!     → 200 or 503
//! ```
//!
//! # Design Decisions
//! - On-demand probing: no background checker, no cached state
//! - A slow probe delays only the aggregate response, never its siblings

pub mod active;
pub mod state;

pub use active::HealthAggregator;
pub use state::{AggregateHealth, HealthProbeResult, HealthStatus, OverallStatus};
