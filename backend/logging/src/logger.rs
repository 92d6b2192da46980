//! Structured Logger
//!
//! Wraps `tracing` to provide console output, file rotation (NDJSON),
//! and environment-based level control.

use std::path::Path;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Rolled files are named `ocr-bridge.log.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "ocr-bridge.log";

/// `RUST_LOG` when set and non-empty, otherwise the configured level.
pub fn filter_directive(rust_log: Option<&str>, level: &str) -> String {
    match rust_log.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => level.to_string(),
    }
}

/// Daily-rotated appender writing into `dir`.
pub fn file_appender(dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(dir)
}

/// Initialize the global structured logger.
///
/// A log directory that cannot be opened leaves console logging only and is
/// reported once the subscriber is installed. Returns `false` when a global
/// subscriber was already installed.
pub fn init_logger(level: &str, log_dir: Option<&Path>, json_console: bool) -> bool {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(rust_log.as_deref(), level);
    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = if json_console {
        fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
            .with_ansi(true)
            .boxed()
    };

    // Rolling NDJSON file, only when a directory is configured
    let (appender, file_error) = match log_dir.map(file_appender) {
        Some(Ok(appender)) => (Some(appender), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let file_layer =
        appender.map(|appender| fmt::layer().json().with_writer(appender).with_ansi(false));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if let (Some(e), Some(dir)) = (file_error, log_dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "Log directory unusable, logging to console only");
    }
    installed
}
