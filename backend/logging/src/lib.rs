//! Structured logging setup for the OCR bridge.
//!
//! Console output (plain or JSON) plus optional NDJSON file rotation.

pub mod logger;

pub use logger::{file_appender, filter_directive, init_logger, LOG_FILE_PREFIX};
