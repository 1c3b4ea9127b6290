//! Tracing subscriber setup
//!
//! Console output goes to stderr, plain or JSON. When a log directory is
//! configured, JSON lines are also written to a daily-rolling file through a
//! non-blocking writer.

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Log file name prefix
pub const LOG_FILE_PREFIX: &str = "linebridge.log";

/// Logging setup errors
#[derive(Error, Debug)]
pub enum LogInitError {
    /// Log directory could not be created
    #[error("Log directory: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber is already installed
    #[error("Subscriber init: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the file writer flushing until dropped
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Build the filter: `RUST_LOG` wins, then `--verbose`, then the configured level
pub fn filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { config.level.as_str() };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<LogGuard, LogInitError> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.json {
        layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
    } else {
        layers.push(fmt::layer().with_writer(std::io::stderr).boxed());
    }

    let mut guard = None;
    if let Some(dir) = &config.directory {
        std::fs::create_dir_all(dir)?;
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter(config, verbose))
        .try_init()?;

    Ok(LogGuard { _file: guard })
}
