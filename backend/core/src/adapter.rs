//! Inference adapter: runs the loaded backend over one image and normalises its
//! output into a single string.

use std::path::PathBuf;

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::handle::ModelHandle;
use crate::ocr_result::OcrResult;
use crate::scratch::ScratchImage;
use crate::traits::{OcrEngine, VisionModel};
use crate::types::DEFAULT_EXTRACTION_PROMPT;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct InferenceAdapter {
    scratch_dir: PathBuf,
    prompt: String,
}

impl Default for InferenceAdapter {
    fn default() -> Self {
        Self::new(std::env::temp_dir(), DEFAULT_EXTRACTION_PROMPT)
    }
}

impl InferenceAdapter {
    pub fn new(scratch_dir: impl Into<PathBuf>, prompt: impl Into<String>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            prompt: prompt.into(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Extract text from `image` with whichever backend `handle` holds.
    pub async fn infer(&self, handle: &ModelHandle, image: RgbImage) -> Result<String, BridgeError> {
        match handle {
            ModelHandle::Ocr(engine) => self.run_ocr(engine.as_ref(), image).await,
            ModelHandle::Vision(model) => self.run_vision(model.as_ref(), image).await,
        }
    }

    async fn run_ocr(&self, engine: &dyn OcrEngine, image: RgbImage) -> Result<String, BridgeError> {
        // The engine reads from disk; the file goes away when `scratch` drops.
        let scratch = ScratchImage::write(&self.scratch_dir, image)
            .await
            .map_err(BridgeError::inference)?;

        info!(engine = engine.name(), "Running OCR engine");
        let raw = engine
            .ocr(scratch.path())
            .await
            .map_err(|e| BridgeError::Inference(format!("{e:#}")))?;
        drop(scratch);
        info!("OCR engine finished");

        let parsed = OcrResult::from_value(raw).map_err(|e| {
            warn!(error = %e, "Unrecognised OCR result shape");
            BridgeError::Inference(format!("unrecognised OCR result shape: {e}"))
        })?;
        debug!(
            shape = parsed.shape(),
            fragments = parsed.fragments().len(),
            "Parsed OCR result"
        );

        let text = parsed.text();
        log_extracted(&text);
        Ok(text)
    }

    async fn run_vision(&self, model: &dyn VisionModel, image: RgbImage) -> Result<String, BridgeError> {
        info!(model = model.model_id(), "Running VLM inference");
        let text = model
            .chat(&image, &self.prompt, &[])
            .await
            .map_err(|e| BridgeError::Inference(format!("{e:#}")))?;
        info!("VLM finished");
        log_extracted(&text);
        Ok(text)
    }
}

fn log_extracted(text: &str) {
    info!(chars = text.chars().count(), "Extracted text");
    debug!(content = %preview(text), "Extracted content");
}

/// At most [`PREVIEW_CHARS`] characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
