//! Configuration validation.
//!
//! Serde handles syntactic checks; this module covers the semantic ones.
//! Every problem is reported, not just the first.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no upstream services configured")]
    NoServices,

    #[error("service name must be a non-empty path segment: '{0}'")]
    InvalidServiceName(String),

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("service '{name}' has invalid url '{url}': {reason}")]
    InvalidServiceUrl { name: String, url: String, reason: String },

    #[error("service '{name}' has rewrite rule with non-absolute prefix '{from}'")]
    InvalidRewrite { name: String, from: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("rate limit path '{0}' must start with '/'")]
    InvalidPath(String),
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.services.is_empty() {
        errors.push(ValidationError::NoServices);
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if service.name.is_empty() || service.name.contains('/') {
            errors.push(ValidationError::InvalidServiceName(service.name.clone()));
        }
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }

        match Url::parse(&service.url) {
            Ok(url) if url.scheme() != "http" => errors.push(ValidationError::InvalidServiceUrl {
                name: service.name.clone(),
                url: service.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Ok(url) if url.host_str().is_none() => errors.push(ValidationError::InvalidServiceUrl {
                name: service.name.clone(),
                url: service.url.clone(),
                reason: "missing host".to_string(),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidServiceUrl {
                name: service.name.clone(),
                url: service.url.clone(),
                reason: e.to_string(),
            }),
        }

        for from in service.path_rewrite.keys() {
            if !from.starts_with('/') {
                errors.push(ValidationError::InvalidRewrite {
                    name: service.name.clone(),
                    from: from.clone(),
                });
            }
        }
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::Zero("rate_limit.window_secs"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::Zero("rate_limit.max_requests"));
    }
    if config.auth_rate_limit.window_secs == 0 {
        errors.push(ValidationError::Zero("auth_rate_limit.window_secs"));
    }
    if config.auth_rate_limit.max_requests == 0 {
        errors.push(ValidationError::Zero("auth_rate_limit.max_requests"));
    }

    for path in config
        .rate_limit
        .exempt_paths
        .iter()
        .chain(config.auth_rate_limit.paths.iter())
    {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidPath(path.clone()));
        }
    }

    if config.timeouts.proxy_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.proxy_secs"));
    }
    if config.timeouts.health_probe_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.health_probe_secs"));
    }
    if config.security.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("security.max_body_bytes"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
