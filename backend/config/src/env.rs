//! Environment handling for config values.
//!
//! Two mechanisms:
//! - `${VAR_NAME}` references inside config file strings, resolved at load time
//!   (`$${}` escapes to a literal `${}`);
//! - `OCR_BRIDGE_*` variables that override individual settings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::schema::BridgeConfig;

/// Pattern matching valid uppercase env var names.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid regex"));

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// An `OCR_BRIDGE_*` override that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("Invalid value for {var}: {message}")]
pub struct EnvOverrideError {
    pub var: String,
    pub message: String,
}

/// Substitute `${VAR}` references in a config value tree using `env`.
pub fn resolve_env_vars_with(
    value: &Value,
    env: &HashMap<String, String>,
) -> Result<Value, MissingEnvVarError> {
    substitute_value(value, env, "")
}

fn substitute_value(
    value: &Value,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<Value, MissingEnvVarError> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => {
            let result: Result<Vec<_>, _> = arr
                .iter()
                .enumerate()
                .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
                .collect();
            Ok(Value::Array(result?))
        }
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(
    s: &str,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<String, MissingEnvVarError> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut error: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &regex::Captures| {
        let var_name = &caps[1];
        if caps[0].starts_with("$$") {
            return format!("${{{var_name}}}");
        }
        match env.get(var_name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                error.get_or_insert(MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = error {
        return Err(err);
    }
    Ok(substituted.into_owned())
}

/// Apply `OCR_BRIDGE_*` overrides from `env` onto `config`.
pub fn apply_env_overrides(
    config: &mut BridgeConfig,
    env: &HashMap<String, String>,
) -> Result<(), EnvOverrideError> {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(v) = get("OCR_BRIDGE_TIER") {
        config.tier = parse("OCR_BRIDGE_TIER", v)?;
    }
    if let Some(v) = get("OCR_BRIDGE_RUNTIME") {
        config.runtime = parse("OCR_BRIDGE_RUNTIME", v)?;
    }
    if let Some(v) = get("OCR_BRIDGE_BIND") {
        config.server.bind = v.to_string();
    }
    if let Some(v) = get("OCR_BRIDGE_PORT") {
        config.server.port = parse("OCR_BRIDGE_PORT", v)?;
    }
    if let Some(v) = get("OCR_BRIDGE_MAX_BODY_BYTES") {
        config.server.max_body_bytes = parse("OCR_BRIDGE_MAX_BODY_BYTES", v)?;
    }
    if let Some(v) = get("OCR_BRIDGE_STRICT_CLIENT_ERRORS") {
        config.server.strict_client_errors = parse_bool("OCR_BRIDGE_STRICT_CLIENT_ERRORS", v)?;
    }
    if let Some(v) = get("OCR_BRIDGE_MAX_CONCURRENT") {
        config.server.max_concurrent_inferences = Some(parse("OCR_BRIDGE_MAX_CONCURRENT", v)?);
    }
    if let Some(v) = get("OCR_BRIDGE_OCR_COMMAND") {
        config.ocr.command = v.split_whitespace().map(String::from).collect();
    }
    if let Some(v) = get("OCR_BRIDGE_OCR_DET_MODEL") {
        config.ocr.det_model = PathBuf::from(v);
    }
    if let Some(v) = get("OCR_BRIDGE_OCR_REC_MODEL") {
        config.ocr.rec_model = PathBuf::from(v);
    }
    if let Some(v) = get("OCR_BRIDGE_OCR_DICT") {
        config.ocr.dict = PathBuf::from(v);
    }
    if let Some(v) = get("OCR_BRIDGE_OCR_LANG") {
        config.ocr.lang = v.to_string();
    }
    if let Some(v) = get("OCR_BRIDGE_WARMUP") {
        config.ocr.warmup = parse_bool("OCR_BRIDGE_WARMUP", v)?;
    }
    if let Some(v) = get("OCR_BRIDGE_VLM_ENDPOINT") {
        config.vlm.endpoint = v.to_string();
    }
    if let Some(v) = get("OCR_BRIDGE_VLM_MODEL") {
        config.vlm.model_id = v.to_string();
    }
    if let Some(v) = get("OCR_BRIDGE_VLM_QUANTIZED_MODEL") {
        config.vlm.quantized_model_id = Some(v.to_string());
    }
    if let Some(v) = get("OCR_BRIDGE_VLM_MODEL_DIR") {
        config.vlm.model_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = get("OCR_BRIDGE_VLM_QUANTIZED_MODEL_DIR") {
        config.vlm.quantized_model_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = get("OCR_BRIDGE_VLM_API_KEY") {
        config.vlm.api_key = Some(v.to_string());
    }
    if let Some(v) = get("OCR_BRIDGE_DEVICE") {
        config.vlm.device = parse("OCR_BRIDGE_DEVICE", v)?;
    }
    if let Some(v) = get("OCR_BRIDGE_CACHE_DIR") {
        config.cache.dir = PathBuf::from(v);
    }
    if let Some(v) = get("OCR_BRIDGE_LOG_LEVEL") {
        config.log.level = v.to_string();
    }
    if let Some(v) = get("OCR_BRIDGE_LOG_DIR") {
        config.log.dir = Some(PathBuf::from(v));
    }
    if let Some(v) = get("OCR_BRIDGE_LOG_JSON") {
        config.log.json = parse_bool("OCR_BRIDGE_LOG_JSON", v)?;
    }
    Ok(())
}

fn parse<T>(var: &str, raw: &str) -> Result<T, EnvOverrideError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| EnvOverrideError {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, EnvOverrideError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EnvOverrideError {
            var: var.to_string(),
            message: format!("expected a boolean, got `{raw}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_bridge_core::{DevicePreference, Tier};
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_simple_var() {
        let v = json!({"vlm": {"api_key": "${VLM_KEY}"}});
        let result = resolve_env_vars_with(&v, &env(&[("VLM_KEY", "sk-abc123")])).unwrap();
        assert_eq!(result["vlm"]["api_key"], "sk-abc123");
    }

    #[test]
    fn error_on_missing_var() {
        let v = json!({"vlm": {"endpoint": "${MISSING_VAR}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("MISSING_VAR"));
        assert!(err.to_string().contains("vlm.endpoint"));
    }

    #[test]
    fn escaped_reference_kept_literal() {
        let v = json!({"ocr": {"command": ["tool", "$${HOME}"]}});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result["ocr"]["command"][1], "${HOME}");
    }

    #[test]
    fn overrides_apply() {
        let mut config = BridgeConfig::default();
        apply_env_overrides(
            &mut config,
            &env(&[
                ("OCR_BRIDGE_TIER", "lite"),
                ("OCR_BRIDGE_PORT", "5055"),
                ("OCR_BRIDGE_DEVICE", "cpu"),
                ("OCR_BRIDGE_OCR_COMMAND", "python3 worker.py {image}"),
                ("OCR_BRIDGE_WARMUP", "off"),
                ("OCR_BRIDGE_MAX_CONCURRENT", "1"),
                ("OCR_BRIDGE_RUNTIME", "external"),
                ("OCR_BRIDGE_VLM_MODEL_DIR", "/models/vl"),
            ]),
        )
        .unwrap();
        assert_eq!(config.runtime, crate::RuntimeKind::External);
        assert_eq!(config.vlm.model_dir.as_deref(), Some(std::path::Path::new("/models/vl")));
        assert_eq!(config.tier, Tier::Lite);
        assert_eq!(config.server.port, 5055);
        assert_eq!(config.vlm.device, DevicePreference::Cpu);
        assert_eq!(config.ocr.command, vec!["python3", "worker.py", "{image}"]);
        assert!(!config.ocr.warmup);
        assert_eq!(config.server.max_concurrent_inferences, Some(1));
    }

    #[test]
    fn blank_overrides_ignored() {
        let mut config = BridgeConfig::default();
        apply_env_overrides(&mut config, &env(&[("OCR_BRIDGE_PORT", "  ")])).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn bad_override_names_variable() {
        let mut config = BridgeConfig::default();
        let err = apply_env_overrides(&mut config, &env(&[("OCR_BRIDGE_PORT", "http")])).unwrap_err();
        assert_eq!(err.var, "OCR_BRIDGE_PORT");
        let err = apply_env_overrides(&mut config, &env(&[("OCR_BRIDGE_TIER", "max")])).unwrap_err();
        assert!(err.message.contains("unknown tier"));
    }
}
