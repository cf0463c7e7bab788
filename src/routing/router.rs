//! Route lookup and dispatch targets.
//!
//! # Responsibilities
//! - Store compiled routes and the upstream endpoints they point at
//! - Look up the matching route for a request path
//! - Apply per-route path rewrites and build upstream URIs
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - First registered route wins; versioned routes register before legacy ones
//! - Explicit NoMatch (`None`) rather than silent default

use std::fmt;
use std::sync::Arc;

use axum::http::Uri;
use url::Url;

use crate::config::ServiceConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// Version segment of the public API namespace.
pub const API_VERSION: &str = "v1";

/// An upstream service the gateway can forward to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub name: String,
    pub base_url: Url,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            name: name.into(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Authority (`host[:port]`) used as the outbound `Host` header.
    pub fn authority(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Join `path_and_query` onto the base URL, keeping any base path.
    pub fn upstream_uri(&self, path_and_query: &str) -> Result<Uri, axum::http::uri::InvalidUri> {
        let base_path = self.base_url.path().trim_end_matches('/');
        let suffix = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{}", path_and_query)
        };
        format!(
            "{}://{}{}{}",
            self.base_url.scheme(),
            self.authority(),
            base_path,
            suffix
        )
        .parse()
    }

    /// URI of the service's health endpoint.
    pub fn health_uri(&self) -> Result<Uri, axum::http::uri::InvalidUri> {
        self.upstream_uri("/health")
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}

/// A compiled route: prefix → upstream, with optional path rewrites.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    matcher: PathPrefixMatcher,
    pub target: Arc<ServiceEndpoint>,
    pub path_rewrite: Vec<(String, String)>,
}

impl RouteEntry {
    pub fn new(prefix: impl Into<String>, target: Arc<ServiceEndpoint>) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(prefix),
            target,
            path_rewrite: Vec::new(),
        }
    }

    pub fn with_rewrite(mut self, rules: impl IntoIterator<Item = (String, String)>) -> Self {
        self.path_rewrite.extend(rules);
        self
    }

    pub fn path_prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    /// Apply the first rewrite rule whose prefix matches; otherwise keep the path.
    pub fn rewrite_path(&self, path: &str) -> String {
        for (from, to) in &self.path_rewrite {
            if let Some(rest) = path.strip_prefix(from.as_str()) {
                let rewritten = format!("{}{}", to, rest);
                return if rewritten.starts_with('/') {
                    rewritten
                } else {
                    format!("/{}", rewritten)
                };
            }
        }
        path.to_string()
    }
}

/// Immutable route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
    services: Vec<Arc<ServiceEndpoint>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the versioned (`/api/v1/{name}`) and legacy (`/api/{name}`) routes
    /// for every configured service.
    pub fn from_config(services: &[ServiceConfig]) -> Result<Self, url::ParseError> {
        let mut router = Self::new();
        let mut legacy = Vec::new();

        for config in services {
            let endpoint = Arc::new(ServiceEndpoint::new(config.name.clone(), &config.url)?);
            let rules: Vec<(String, String)> = config
                .path_rewrite
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect();

            router.routes.push(
                RouteEntry::new(format!("/api/{}/{}", API_VERSION, config.name), endpoint.clone())
                    .with_rewrite(rules.clone()),
            );
            legacy.push(RouteEntry::new(format!("/api/{}", config.name), endpoint.clone()).with_rewrite(rules));
            router.services.push(endpoint);
        }

        router.routes.extend(legacy);
        Ok(router)
    }

    /// Register an additional route after the existing ones.
    pub fn push(&mut self, route: RouteEntry) {
        if !self.services.iter().any(|s| Arc::ptr_eq(s, &route.target)) {
            self.services.push(route.target.clone());
        }
        self.routes.push(route);
    }

    /// First registered route matching `path`.
    pub fn match_path(&self, path: &str) -> Option<&RouteEntry> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Distinct upstream services, in registration order.
    pub fn services(&self) -> &[Arc<ServiceEndpoint>] {
        &self.services
    }
}
