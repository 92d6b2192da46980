//! `ocr-bridge-config`: OCR bridge runtime configuration.
//!
//! Provides:
//! - Typed config schema with built-in defaults
//! - TOML loading with `${ENV_VAR}` substitution
//! - `OCR_BRIDGE_*` environment overrides
//! - Validation
//! - Model cache layout

pub mod cache;
pub mod env;
pub mod error;
pub mod io;
pub mod schema;
pub mod validation;

pub use cache::CacheLayout;
pub use env::{apply_env_overrides, resolve_env_vars_with, EnvOverrideError, MissingEnvVarError};
pub use error::ConfigError;
pub use io::{config_file_path, load_config, parse_config, CONFIG_PATH_ENV};
pub use schema::{
    BridgeConfig, CacheConfig, LogConfig, OcrConfig, RuntimeKind, ServerConfig, VlmConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;
use std::path::Path;

/// Defaults, then the config file (if any), then the process environment.
///
/// CLI flags are applied by the caller; run [`validate`] afterwards.
pub async fn load_layered(explicit: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_layered_with(explicit, &env).await
}

pub async fn load_layered_with(
    explicit: Option<&Path>,
    env: &HashMap<String, String>,
) -> Result<BridgeConfig, ConfigError> {
    let mut config = match config_file_path(explicit, env) {
        Some(path) => load_config(&path, env).await?,
        None => {
            tracing::debug!("No config file; using defaults");
            BridgeConfig::default()
        }
    };
    apply_env_overrides(&mut config, env)?;
    Ok(config)
}
