//! Logging initialization.
//!
//! Thin wrapper over the observability package that picks the output shape
//! from the environment:
//!
//! - `THE411_LOG_FORMAT=json` switches to JSON lines.
//! - `THE411_LOG_FILE=<path>` appends those lines to a file instead of stderr.

use observability::{LogConfig, LogFormat};
use std::path::PathBuf;

/// Initialize logging for the site tools at the given default level.
///
/// Failing to install the subscriber is not fatal: the error is printed and
/// the process continues without logs.
pub fn init_logging(level: &str) {
    let format = std::env::var("THE411_LOG_FORMAT")
        .map(|name| LogFormat::from_name(&name))
        .unwrap_or_default();
    let log_path = std::env::var("THE411_LOG_FILE")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);

    if let Err(e) = observability::init_with_config(LogConfig {
        service_name: "the411".into(),
        default_level: level.into(),
        format,
        log_path,
    }) {
        eprintln!("logging disabled: {}", e);
    }
}
