//! Fixed-window rate limiting.
//!
//! Each client key owns a `{count, window_start}` pair in a sharded map. The
//! read-reset-increment-compare sequence runs under the entry's shard lock, so
//! concurrent requests for one key never admit more than `max_requests`.
//!
//! A client can see up to twice the ceiling across a window boundary; fixed
//! windows accept that in exchange for O(1) state per key.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::{AuthRateLimitConfig, RateLimitConfig};
use crate::error::{GatewayError, LimiterKind};
use crate::http::request::{client_ip, peer_addr, RequestIdExt};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::routing::matcher::PathPrefixMatcher;

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
const RETRY_AFTER: HeaderName = HeaderName::from_static("retry-after");

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    window_start: Instant,
}

/// Outcome of one limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Seconds until the window ends, rounded up.
    pub fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// `RateLimit-*` headers, plus `Retry-After` on rejection.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(self.reset_secs()));
        if !self.allowed {
            headers.insert(RETRY_AFTER, HeaderValue::from(self.reset_secs()));
        }
        headers
    }
}

/// Per-key fixed-window counter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Count one request for `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count = entry.count.saturating_add(1);

        RateLimitDecision {
            allowed: entry.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_after: self
                .window
                .saturating_sub(now.saturating_duration_since(entry.window_start)),
        }
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[derive(Debug)]
enum Scope {
    /// Every path except the exact matches listed.
    AllExcept(HashSet<String>),
    /// Only paths under one of the prefixes.
    Only(Vec<PathPrefixMatcher>),
}

/// A limiter plus the paths it guards.
#[derive(Debug)]
pub struct RateLimitPolicy {
    kind: LimiterKind,
    enabled: bool,
    limiter: FixedWindowLimiter,
    scope: Scope,
    trust_forwarded_for: bool,
}

impl RateLimitPolicy {
    pub fn general(config: &RateLimitConfig) -> Self {
        Self {
            kind: LimiterKind::General,
            enabled: config.enabled,
            limiter: FixedWindowLimiter::new(Duration::from_secs(config.window_secs), config.max_requests),
            scope: Scope::AllExcept(config.exempt_paths.iter().cloned().collect()),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }

    pub fn auth(config: &AuthRateLimitConfig, trust_forwarded_for: bool) -> Self {
        Self {
            kind: LimiterKind::Auth,
            enabled: config.enabled,
            limiter: FixedWindowLimiter::new(Duration::from_secs(config.window_secs), config.max_requests),
            scope: Scope::Only(config.paths.iter().map(PathPrefixMatcher::new).collect()),
            trust_forwarded_for,
        }
    }

    pub fn kind(&self) -> LimiterKind {
        self.kind
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.limiter
    }

    pub fn applies_to(&self, path: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.scope {
            Scope::AllExcept(exempt) => !exempt.contains(path),
            Scope::Only(matchers) => matchers.iter().any(|m| m.matches(path)),
        }
    }
}

/// Middleware enforcing one `RateLimitPolicy`.
///
/// Layered twice: the general policy outside, the auth policy inside. Headers
/// from an inner limiter are kept, so auth headers win when both apply.
pub async fn rate_limit(
    State(policy): State<Arc<RateLimitPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !policy.applies_to(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_ip(
        request.headers(),
        peer_addr(request.extensions()),
        policy.trust_forwarded_for,
    )
    .map(|ip| ip.to_string())
    .unwrap_or_else(|| "unknown".to_string());

    let decision = policy.limiter.check(&key);

    if !decision.allowed {
        tracing::warn!(
            request_id = %request.request_id(),
            client = %key,
            limiter = policy.kind.as_str(),
            path = %request.uri().path(),
            "Rate limit exceeded"
        );
        metrics::record_rate_limited(policy.kind.as_str());
        return (decision.headers(), GatewayError::RateLimited { kind: policy.kind }).into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in decision.headers().iter() {
        if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    response
}

/// Periodically evict expired windows until shutdown.
pub async fn run_sweeper(
    policies: Vec<Arc<RateLimitPolicy>>,
    interval: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                for policy in &policies {
                    let evicted = policy.limiter.evict_expired(now);
                    if evicted > 0 {
                        tracing::debug!(
                            limiter = policy.kind.as_str(),
                            evicted,
                            remaining = policy.limiter.tracked_keys(),
                            "Evicted expired rate limit windows"
                        );
                    }
                }
            }
            _ = shutdown.triggered() => {
                tracing::debug!("Rate limit sweeper stopping");
                break;
            }
        }
    }
}
