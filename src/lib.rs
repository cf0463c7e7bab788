//! API gateway for the LLM frontend.
//!
//! One entry point in front of the auth, core, payment, llm and rag services.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────────┐
//!                         │                      API GATEWAY                       │
//!                         │                                                        │
//!     Client Request      │  ┌─────────┐   ┌──────────┐   ┌──────────┐             │
//!     ────────────────────┼─▶│   net   │──▶│   http   │──▶│ security │             │
//!                         │  │listener │   │  server  │   │cors/limit│             │
//!                         │  └─────────┘   └──────────┘   └────┬─────┘             │
//!                         │                                    │                   │
//!                         │                ┌──────────┐        ▼                   │
//!                         │                │  health  │   ┌──────────┐             │
//!                         │                │aggregator│   │ routing  │             │
//!                         │                └────┬─────┘   │  table   │             │
//!                         │                     │         └────┬─────┘             │
//!                         │                     ▼              ▼                   │
//!     Client Response     │  ┌──────────┐   ┌────────────────────────┐             │
//!     ◀───────────────────┼──│  error   │◀──│ http client (Forwarder)│◀────────────┼──── Upstream
//!                         │  │ responder│   └────────────────────────┘             │     Services
//!                         │  └──────────┘                                          │
//!                         │                                                        │
//!                         │  Cross-cutting: config · observability · lifecycle     │
//!                         └───────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod routing;

// Traffic management
pub mod health;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
