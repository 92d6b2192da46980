//! OCR bridge configuration schema.
//!
//! Every section has defaults, so an empty file (or no file) is a valid config.

use ocr_bridge_core::{DevicePreference, Tier, DEFAULT_EXTRACTION_PROMPT, DEFAULT_VLM_MODEL_ID};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Backend tier chosen at startup.
    pub tier: Tier,
    /// Where inference runs.
    pub runtime: RuntimeKind,
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub vlm: VlmConfig,
    pub cache: CacheConfig,
    pub log: LogConfig,
}

impl BridgeConfig {
    /// Label reported by `/health` for the configured tier.
    pub fn model_label(&self) -> String {
        self.tier.model_label(&self.vlm.model_id)
    }
}

/// In-process inference, or delegation to an external program and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// ONNX OCR pipeline and candle VLM inside the bridge process.
    #[default]
    Local,
    /// `ocr.command` for eco, an OpenAI-compatible server for lite/pro.
    External,
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeKind::Local => f.write_str("local"),
            RuntimeKind::External => f.write_str("external"),
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(RuntimeKind::Local),
            "external" => Ok(RuntimeKind::External),
            other => Err(format!("unknown runtime `{other}` (expected local or external)")),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Report undecodable payloads as 400 instead of 500.
    pub strict_client_errors: bool,
    /// Bound on concurrently running inferences. Unset means no admission control.
    pub max_concurrent_inferences: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5000,
            max_body_bytes: 50 * 1024 * 1024,
            strict_client_errors: false,
            max_concurrent_inferences: None,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        if self.bind.contains(':') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// PP-OCRv4 mobile detection model (ONNX). Relative paths live under the
    /// cache's `ocr` directory.
    pub det_model: PathBuf,
    /// PP-OCRv4 mobile recognition model (ONNX).
    pub rec_model: PathBuf,
    /// Character dictionary matching `rec_model`.
    pub dict: PathBuf,
    /// Text-line orientation classifier, used when `use_angle_cls` is set.
    pub textline_orientation_model: Option<PathBuf>,
    /// External runtime only: program and arguments. `{image}`, `{lang}` and
    /// `{angle_cls}` are substituted.
    pub command: Vec<String>,
    pub lang: String,
    pub use_angle_cls: bool,
    pub warmup: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            det_model: PathBuf::from("PP-OCRv4_mobile_det.onnx"),
            rec_model: PathBuf::from("PP-OCRv4_mobile_rec.onnx"),
            dict: PathBuf::from("ppocr_keys_v1.txt"),
            textline_orientation_model: Some(PathBuf::from("PP-LCNet_x0_25_textline_ori.onnx")),
            command: Vec::new(),
            lang: "en".to_string(),
            use_angle_cls: true,
            warmup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlmConfig {
    /// External runtime only: base URL of an OpenAI-compatible server.
    pub endpoint: String,
    pub model_id: String,
    /// Id of the 4-bit variant used by the `lite` tier.
    pub quantized_model_id: Option<String>,
    /// Checkpoint directory (`config.json`, `model.safetensors`,
    /// `tokenizer.json`). Defaults to `<cache>/hf/<model_id>`.
    pub model_dir: Option<PathBuf>,
    /// Reduced-precision checkpoint for `lite`. Defaults to
    /// `<cache>/hf/<quantized_model_id>`.
    pub quantized_model_dir: Option<PathBuf>,
    pub api_key: Option<String>,
    pub device: DevicePreference,
    pub prompt: String,
    pub max_tokens: u32,
}

impl Default for VlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000".to_string(),
            model_id: DEFAULT_VLM_MODEL_ID.to_string(),
            quantized_model_id: Some(format!("{DEFAULT_VLM_MODEL_ID}-bnb-4bit")),
            model_dir: None,
            quantized_model_dir: None,
            api_key: None,
            device: DevicePreference::Auto,
            prompt: DEFAULT_EXTRACTION_PROMPT.to_string(),
            max_tokens: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// Cache and logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root for downloaded model files.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".paddle_cache"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Directory for rotating NDJSON logs. Console only when unset.
    pub dir: Option<PathBuf>,
    /// JSON console output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}
