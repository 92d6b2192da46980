//! Config file loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use crate::env::resolve_env_vars_with;
use crate::error::ConfigError;
use crate::schema::BridgeConfig;

/// Env var naming a config file when `--config` is not given.
pub const CONFIG_PATH_ENV: &str = "OCR_BRIDGE_CONFIG";

/// Explicit path wins, then `OCR_BRIDGE_CONFIG`. `None` means built-in defaults only.
pub fn config_file_path(explicit: Option<&Path>, env: &HashMap<String, String>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        env.get(CONFIG_PATH_ENV)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

/// Read and parse a TOML config file, resolving `${VAR}` references from `env`.
///
/// A named file that does not exist is an error.
pub async fn load_config(
    path: &Path,
    env: &HashMap<String, String>,
) -> Result<BridgeConfig, ConfigError> {
    let raw = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(&raw, env).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })?;

    info!(path = %path.display(), tier = %config.tier, "Loaded config");
    Ok(config)
}

/// Parse TOML text into a config. Errors carry an empty path.
pub fn parse_config(raw: &str, env: &HashMap<String, String>) -> Result<BridgeConfig, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: PathBuf::new(),
        message,
    };

    let table: toml::Value = toml::from_str(raw).map_err(|e| parse_err(e.to_string()))?;
    let value: Value = serde_json::to_value(table).map_err(|e| parse_err(e.to_string()))?;
    let value = resolve_env_vars_with(&value, env)?;
    debug!("Resolved env references in config");

    serde_json::from_value(value).map_err(|e| parse_err(e.to_string()))
}
