//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment overlay: API_PORT, *_SERVICE_URL, CORS_ORIGINS, ... (loader.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthRateLimitConfig, CorsConfig, Environment, GatewayConfig, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, SecurityConfig, ServiceConfig, TimeoutConfig,
};
pub use validation::ValidationError;
