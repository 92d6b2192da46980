use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::types::{Device, Precision};

/// A general-purpose OCR engine.
///
/// Engines read the image from disk and return their native result, which is
/// classified by [`crate::OcrResult::from_value`].
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Human-readable engine name.
    fn name(&self) -> &str;

    /// Run OCR over the image stored at `image_path`.
    async fn ocr(&self, image_path: &Path) -> Result<serde_json::Value>;
}

/// A vision-language model with its tokenizer.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier as served.
    fn model_id(&self) -> &str;

    /// Conversational inference over one image.
    async fn chat(&self, image: &RgbImage, prompt: &str, history: &[ChatTurn]) -> Result<String>;
}

/// Loads backends. One runtime serves every tier.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Whether an accelerator device can be used.
    fn accelerator_available(&self) -> bool;

    async fn load_ocr(&self, options: &OcrEngineOptions) -> Result<Arc<dyn OcrEngine>, LoadError>;

    async fn load_vision(&self, spec: &VisionLoadSpec) -> Result<Arc<dyn VisionModel>, LoadError>;
}

/// One prior exchange in a VLM conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Options for constructing the OCR engine.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrEngineOptions {
    pub lang: String,
    pub use_angle_cls: bool,
}

impl Default for OcrEngineOptions {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            use_angle_cls: true,
        }
    }
}

/// What the loader asks the runtime for on vision tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionLoadSpec {
    pub model_id: String,
    pub device: Device,
    pub precision: Precision,
}
