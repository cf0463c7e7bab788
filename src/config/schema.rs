//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment (controls error detail and CORS defaults).
    pub environment: Environment,

    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Upstream services, in route registration order.
    pub services: Vec<ServiceConfig>,

    /// CORS policy.
    pub cors: CorsConfig,

    /// General rate limiter applied to all traffic.
    pub rate_limit: RateLimitConfig,

    /// Stricter limiter applied to login and registration.
    pub auth_rate_limit: AuthRateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            listener: ListenerConfig::default(),
            services: default_services(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth_rate_limit: AuthRateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Whether requests without an `Origin` header pass the CORS check.
    pub fn allows_missing_origin(&self) -> bool {
        self.cors
            .allow_missing_origin
            .unwrap_or_else(|| self.environment.is_development())
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// An upstream service the gateway forwards to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Logical service name; also the route segment (`/api/v1/{name}`).
    pub name: String,

    /// Base URL of the service (e.g., "http://backend-core:8080").
    pub url: String,

    /// Prefix rewrites applied before forwarding (`from` → `to`).
    #[serde(default)]
    pub path_rewrite: BTreeMap<String, String>,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            path_rewrite: BTreeMap::new(),
        }
    }

    /// Name of the environment variable that overrides this service's URL.
    pub fn url_env_var(&self) -> String {
        format!("{}_SERVICE_URL", self.name.to_ascii_uppercase().replace('-', "_"))
    }
}

fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig::new("auth", "http://auth-service:8080"),
        ServiceConfig::new("core", "http://backend-core:8080"),
        ServiceConfig::new("payment", "http://payment-service:8080"),
        ServiceConfig::new("llm", "http://llm-proxy:8080"),
        ServiceConfig::new("rag", "http://rag-service:8080"),
    ]
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins allowed; `*` allows any origin.
    pub allowed_origins: Vec<String>,

    /// Admit requests without an Origin header. Unset means "development only".
    pub allow_missing_origin: Option<bool>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allow_missing_origin: None,
            max_age_secs: 600,
        }
    }
}

/// General rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per client per window.
    pub max_requests: u32,

    /// Paths that are never throttled (exact match).
    pub exempt_paths: Vec<String>,

    /// Key clients by the first `X-Forwarded-For` hop instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 100,
            exempt_paths: vec!["/".to_string(), "/health".to_string()],
            trust_forwarded_for: false,
        }
    }
}

/// Authentication endpoint rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthRateLimitConfig {
    /// Enable the auth limiter.
    pub enabled: bool,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// Maximum attempts per client per window.
    pub max_requests: u32,

    /// Path prefixes the limiter applies to.
    pub paths: Vec<String>,
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 5,
            paths: vec![
                "/api/v1/auth/login".to_string(),
                "/api/v1/auth/register".to_string(),
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
            ],
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upstream request timeout (total time for request/response) in seconds.
    pub proxy_secs: u64,

    /// Per-service health probe timeout in seconds.
    pub health_probe_secs: u64,

    /// Maximum time to drain in-flight requests on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            proxy_secs: 30,
            health_probe_secs: 5,
            shutdown_grace_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format: "json" or "text".
    pub log_format: String,

    /// Optional log file; rotated daily.
    pub log_file: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            log_file: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub headers_enabled: bool,
    /// Maximum body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            headers_enabled: true,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}
