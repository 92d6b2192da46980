//! Config validation: field checks with user-friendly error messages.

use crate::error::ConfigError;
use crate::schema::{BridgeConfig, RuntimeKind};
use ocr_bridge_core::Tier;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Log warnings and turn any errors into `ConfigError::Invalid`.
    pub fn into_result(self) -> Result<(), ConfigError> {
        for warning in &self.warnings {
            tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(self.errors))
        }
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &BridgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_ocr(config, &mut report);
    validate_vlm(config, &mut report);
    report
}

fn validate_server(config: &BridgeConfig, report: &mut ValidationReport) {
    let server = &config.server;
    if server.port == 0 {
        report.error("server.port", "Port must be between 1 and 65535");
    }
    if server.bind.trim().is_empty() {
        report.error("server.bind", "Bind address must not be empty");
    } else if !matches!(server.bind.as_str(), "127.0.0.1" | "localhost" | "::1") {
        report.warn(
            "server.bind",
            format!("Bridge has no authentication and will listen on {}", server.bind),
        );
    }
    if server.max_body_bytes == 0 {
        report.error("server.max_body_bytes", "Body limit must be greater than zero");
    }
    if server.max_concurrent_inferences == Some(0) {
        report.error(
            "server.max_concurrent_inferences",
            "Concurrency bound must be at least 1 (leave unset for no bound)",
        );
    }
}

fn validate_ocr(config: &BridgeConfig, report: &mut ValidationReport) {
    match config.runtime {
        RuntimeKind::Local => {
            let ocr = &config.ocr;
            for (path, value) in [
                ("ocr.det_model", &ocr.det_model),
                ("ocr.rec_model", &ocr.rec_model),
                ("ocr.dict", &ocr.dict),
            ] {
                if value.as_os_str().is_empty() {
                    report.error(path, "Model path must not be empty");
                }
            }
        }
        RuntimeKind::External if config.tier == Tier::Eco => {
            match config.ocr.command.first() {
                None => report.error("ocr.command", "External runtime needs an OCR command"),
                Some(program) if program.trim().is_empty() => {
                    report.error("ocr.command[0]", "OCR program must not be blank")
                }
                Some(_) => {}
            }
            if !config.ocr.command.is_empty()
                && !config.ocr.command.iter().any(|a| a.contains("{image}"))
            {
                report.warn(
                    "ocr.command",
                    "No {image} placeholder; the engine will not receive the image path",
                );
            }
        }
        RuntimeKind::External => {}
    }
}

fn validate_vlm(config: &BridgeConfig, report: &mut ValidationReport) {
    let vlm = &config.vlm;
    if config.runtime == RuntimeKind::External
        && !(vlm.endpoint.starts_with("http://") || vlm.endpoint.starts_with("https://"))
    {
        report.error("vlm.endpoint", "Endpoint must start with http:// or https://");
    }
    if vlm.model_id.trim().is_empty() {
        report.error("vlm.model_id", "Model id must not be empty");
    }
    if vlm.max_tokens == 0 {
        report.error("vlm.max_tokens", "max_tokens must be greater than zero");
    }
    if config.tier == Tier::Lite && vlm.quantized_model_id.is_none() {
        report.warn(
            "vlm.quantized_model_id",
            "No quantized model configured; lite tier will load at full precision",
        );
    }
}
