use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Label reported for the fast OCR tier.
pub const ECO_MODEL_LABEL: &str = "PP-OCRv4-Mobile";

/// Vision-language model served for the `lite` and `pro` tiers.
pub const DEFAULT_VLM_MODEL_ID: &str = "PaddlePaddle/PaddleOCR-VL-1.5";

/// Instruction sent to the VLM with every image.
pub const DEFAULT_EXTRACTION_PROMPT: &str =
    "Extract all text and structured info from this document.";

/// Backend tier, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Standard OCR engine. Fast, CPU friendly.
    #[default]
    Eco,
    /// Vision-language model with 4-bit quantization.
    Lite,
    /// Vision-language model at full precision.
    Pro,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Eco, Tier::Lite, Tier::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Eco => "eco",
            Tier::Lite => "lite",
            Tier::Pro => "pro",
        }
    }

    /// Whether this tier is served by a vision-language model.
    pub fn is_vision(&self) -> bool {
        !matches!(self, Tier::Eco)
    }

    /// Precision requested from the runtime. Only meaningful for vision tiers.
    pub fn precision(&self) -> Precision {
        match self {
            Tier::Lite => Precision::Quantized4Bit,
            Tier::Eco | Tier::Pro => Precision::Full,
        }
    }

    /// Message returned to callers that arrive before the model is installed.
    pub fn not_ready_message(&self) -> &'static str {
        match self {
            Tier::Eco => "OCR Engine not ready yet. Please wait.",
            Tier::Lite | Tier::Pro => "VLM not loaded",
        }
    }

    /// Model label for `/health`, given the configured VLM id.
    pub fn model_label(&self, vlm_model_id: &str) -> String {
        match self {
            Tier::Eco => ECO_MODEL_LABEL.to_string(),
            Tier::Lite | Tier::Pro => vlm_model_id.to_string(),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eco" => Ok(Tier::Eco),
            "lite" => Ok(Tier::Lite),
            "pro" => Ok(Tier::Pro),
            other => Err(BridgeError::InvalidInput(format!(
                "unknown tier `{other}` (expected eco, lite or pro)"
            ))),
        }
    }
}

/// Numeric precision a vision model is loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Full,
    Quantized4Bit,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Full => f.write_str("full"),
            Precision::Quantized4Bit => f.write_str("4bit"),
        }
    }
}

/// Compute device a vision model is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda => f.write_str("cuda"),
            Device::Cpu => f.write_str("cpu"),
        }
    }
}

/// Operator preference for device placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Use the accelerator when one is available.
    #[default]
    Auto,
    Cuda,
    Cpu,
}

impl DevicePreference {
    pub fn resolve(&self, accelerator_available: bool) -> Device {
        match self {
            DevicePreference::Auto if accelerator_available => Device::Cuda,
            DevicePreference::Auto => Device::Cpu,
            DevicePreference::Cuda => Device::Cuda,
            DevicePreference::Cpu => Device::Cpu,
        }
    }
}

impl FromStr for DevicePreference {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "cpu" => Ok(DevicePreference::Cpu),
            other => Err(BridgeError::InvalidInput(format!(
                "unknown device `{other}` (expected auto, cuda or cpu)"
            ))),
        }
    }
}

/// Text extracted from one request, tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    pub text: String,
    pub tier: Tier,
}
