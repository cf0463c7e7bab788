//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Route events to stdout and, optionally, daily-rolling files
//!
//! # Design Decisions
//! - JSON lines by default; `log_format = "text"` (or anything but "json")
//!   switches stdout to the human-readable formatter
//! - `RUST_LOG` takes precedence over the configured level
//! - Writers are non-blocking; the returned guards flush them on drop and must
//!   live until the process exits

use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{
    filter::{LevelFilter, ParseError},
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer, Registry,
};

use crate::config::ObservabilityConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Flush guards for the non-blocking writers.
#[must_use = "dropping the guards stops log output"]
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the env filter: `RUST_LOG` when set, else the configured level.
pub fn env_filter(level: &str) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level),
    }
}

pub fn init_logging(config: &ObservabilityConfig) -> Result<LoggingGuards, LoggingError> {
    let filter = env_filter(&config.log_level)?;
    let mut guards = Vec::new();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let (stdout, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(std::io::stdout());
    guards.push(guard);

    if config.log_format.eq_ignore_ascii_case("json") {
        layers.push(fmt::layer().with_writer(stdout).with_target(false).json().boxed());
    } else {
        layers.push(fmt::layer().with_writer(stdout).boxed());
    }

    if let Some(file) = &config.log_file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let prefix = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("api-gateway.log");

        let (all, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix));
        guards.push(guard);
        layers.push(fmt::layer().with_writer(all).with_ansi(false).json().boxed());

        let (errors, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
            dir,
            format!("{}.error", prefix),
        ));
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_writer(errors)
                .with_ansi(false)
                .json()
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).with(filter).try_init()?;

    Ok(LoggingGuards { _guards: guards })
}
