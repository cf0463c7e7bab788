//! Gateway-wide middleware that does not belong to a security check.

pub mod error_boundary;

pub use error_boundary::{error_boundary, panic_response};
