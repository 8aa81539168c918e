//! # Observability
//!
//! Logging setup shared by every binary in the workspace.
//!
//! Library crates never configure logging. They use the standard `tracing`
//! macros with structured fields and leave the decision of where the lines
//! go to the binary, which calls [`init_with_config`] once at startup.
//!
//! Two output shapes are supported:
//!
//! - [`LogFormat::Compact`]: human-readable lines on stderr.
//! - [`LogFormat::Json`]: one JSON object per line, either on stderr or
//!   appended to a log file (see [`LogConfig::log_path`]).
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "the411".into(),
//!     default_level: "debug".into(),
//!     ..Default::default()
//! })?;
//! tracing::info!("ready");
//! ```

mod json_layer;
mod writer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry, REDACTED};
pub use writer::{AppendLogWriter, AppendWriterFactory};

/// Shape of emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable output.
    #[default]
    Compact,
    /// JSON lines.
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to compact for unknown values.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every JSON line.
    pub service_name: String,

    /// Default level filter (e.g. "debug", "info").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Output format.
    pub format: LogFormat,

    /// Append JSON lines to this file instead of stderr.
    /// Only used with [`LogFormat::Json`].
    pub log_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            format: LogFormat::Compact,
            log_path: None,
        }
    }
}

/// Error raised when the global subscriber cannot be installed.
#[derive(Debug)]
pub enum InitError {
    /// The log file could not be opened.
    Io(io::Error),
    /// A global subscriber was already installed.
    AlreadyInitialized,
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::Io(e) => write!(f, "failed to open log file: {}", e),
            InitError::AlreadyInitialized => write!(f, "logging already initialized"),
        }
    }
}

impl std::error::Error for InitError {}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) -> Result<(), InitError> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with a custom configuration.
pub fn init_with_config(config: LogConfig) -> Result<(), InitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    match config.format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .compact()
                    .with_writer(io::stderr)
                    .with_filter(env_filter),
            )
            .try_init()
            .map_err(|_| InitError::AlreadyInitialized),
        LogFormat::Json => match &config.log_path {
            Some(path) => {
                let writer = AppendLogWriter::new(path).map_err(InitError::Io)?;
                let layer = JsonLayer::new(config.service_name.clone(), AppendWriterFactory::new(writer));
                tracing_subscriber::registry()
                    .with(layer.with_filter(env_filter))
                    .try_init()
                    .map_err(|_| InitError::AlreadyInitialized)
            }
            None => {
                let layer = JsonLayer::new(config.service_name.clone(), io::stderr);
                tracing_subscriber::registry()
                    .with(layer.with_filter(env_filter))
                    .try_init()
                    .map_err(|_| InitError::AlreadyInitialized)
            }
        },
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn};
