//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with local endpoints and the proxy fallback
//! - Wire up middleware (request ID, tracing, error boundary, security)
//! - Serve on a bound listener until shutdown, then drain
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId → Trace → compression → error boundary
//!     → security headers → catch panic → CORS → general limiter
//!     → auth limiter → body checks → routes / proxy
//! ```

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
};

use crate::config::GatewayConfig;
use crate::error::ErrorResponder;
use crate::health::HealthAggregator;
use crate::http::client::{Forwarder, HyperForwarder};
use crate::http::handlers;
use crate::http::middleware::{error_boundary, panic_response};
use crate::http::proxy::proxy;
use crate::http::request::{MakeCorrelationId, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::observability::tracing::trace_layer;
use crate::routing::Router as RouteTable;
use crate::security::{
    cors::{self, CorsPolicy},
    headers::with_security_headers,
    limits::{body_limits, BodyLimit},
    rate_limit::{self, RateLimitPolicy},
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub router: Arc<RouteTable>,
    pub forwarder: Arc<dyn Forwarder>,
    pub health: Arc<HealthAggregator>,
    pub responder: ErrorResponder,
    pub started_at: Instant,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    app: Router,
    config: Arc<GatewayConfig>,
    limiters: Vec<Arc<RateLimitPolicy>>,
}

impl HttpServer {
    /// Create a server that forwards through a pooled hyper client.
    pub fn new(config: GatewayConfig) -> Result<Self, url::ParseError> {
        let forwarder = HyperForwarder::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.proxy_secs),
        );
        Self::with_forwarder(config, Arc::new(forwarder))
    }

    /// Create a server with a custom forwarding implementation.
    pub fn with_forwarder(config: GatewayConfig, forwarder: Arc<dyn Forwarder>) -> Result<Self, url::ParseError> {
        let config = Arc::new(config);
        let router = Arc::new(RouteTable::from_config(&config.services)?);
        let health = Arc::new(HealthAggregator::new(
            forwarder.clone(),
            router.services().to_vec(),
            Duration::from_secs(config.timeouts.health_probe_secs),
        ));

        let state = AppState {
            config: config.clone(),
            router,
            forwarder,
            health,
            responder: ErrorResponder::new(config.environment),
            started_at: Instant::now(),
        };

        let limiters = vec![
            Arc::new(RateLimitPolicy::general(&config.rate_limit)),
            Arc::new(RateLimitPolicy::auth(
                &config.auth_rate_limit,
                config.rate_limit.trust_forwarded_for,
            )),
        ];

        let app = Self::build_router(&config, state, &limiters);
        Ok(Self { app, config, limiters })
    }

    fn build_router(config: &GatewayConfig, state: AppState, limiters: &[Arc<RateLimitPolicy>]) -> Router {
        let responder = state.responder;

        let mut app = Router::new()
            .route("/", get(handlers::root).fallback(proxy))
            .route("/health", get(handlers::health).fallback(proxy))
            .route("/openapi.json", get(handlers::openapi).fallback(proxy))
            .route("/docs", get(handlers::docs).fallback(proxy))
            .fallback(proxy)
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                BodyLimit(config.security.max_body_bytes),
                body_limits,
            ));

        // first pushed is outermost
        for policy in limiters.iter().rev() {
            app = app.layer(middleware::from_fn_with_state(policy.clone(), rate_limit::rate_limit));
        }

        let mut app = app
            .layer(middleware::from_fn_with_state(
                Arc::new(CorsPolicy::from_config(config)),
                cors::cors,
            ))
            .layer(CatchPanicLayer::custom(panic_response));

        if config.security.headers_enabled {
            app = with_security_headers(app);
        }

        app.layer(middleware::from_fn_with_state(responder, error_boundary))
            .layer(CompressionLayer::new())
            .layer(trace_layer())
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeCorrelationId))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight
    /// requests for at most `shutdown_grace_secs`.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            "HTTP server starting"
        );

        tokio::spawn(rate_limit::run_sweeper(
            self.limiters.clone(),
            SWEEP_INTERVAL,
            shutdown.subscribe(),
        ));

        let mut stop = shutdown.subscribe();
        let mut grace_started = shutdown.subscribe();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop.triggered().await;
                tracing::info!("Stopped accepting connections, draining");
            })
            .into_future();

        tokio::select! {
            result = server => result?,
            _ = async move {
                grace_started.triggered().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(grace_secs = grace.as_secs(), "Drain deadline reached, dropping open connections");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
