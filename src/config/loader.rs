//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Environment, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then environment
/// variables. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_file(path)?,
        None => GatewayConfig::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so the mapping can be exercised without
/// touching process-global state.
pub fn apply_env_overrides<F>(mut config: GatewayConfig, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("API_HOST") {
        config.listener.host = host;
    }
    if let Some(port) = lookup("API_PORT") {
        config.listener.port = parse_env("API_PORT", &port)?;
    }
    if let Some(env) = lookup("ENVIRONMENT") {
        config.environment = env
            .parse::<Environment>()
            .map_err(|message| ConfigError::Env { var: "ENVIRONMENT", message })?;
    }

    for service in config.services.iter_mut() {
        if let Some(url) = lookup(&service.url_env_var()) {
            service.url = url;
        }
    }

    if let Some(origins) = lookup("CORS_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(window) = lookup("RATE_LIMIT_WINDOW") {
        config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW", &window)?;
    }
    if let Some(max) = lookup("RATE_LIMIT_REQUESTS") {
        config.rate_limit.max_requests = parse_env("RATE_LIMIT_REQUESTS", &max)?;
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = format;
    }
    if let Some(file) = lookup("LOG_FILE") {
        config.observability.log_file = Some(file).filter(|f| !f.is_empty());
    }

    Ok(config)
}

fn parse_env<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Env {
        var,
        message: e.to_string(),
    })
}
