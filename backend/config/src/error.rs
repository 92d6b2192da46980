use std::path::PathBuf;

use thiserror::Error;

use crate::env::{EnvOverrideError, MissingEnvVarError};
use crate::validation::ConfigValidationError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVarError),

    #[error(transparent)]
    EnvOverride(#[from] EnvOverrideError),

    #[error("Invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ConfigValidationError>),
}

fn join_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
