//! Tier selector and loader.
//!
//! Runs once at startup. The caller treats any error as fatal.

use std::path::PathBuf;

use image::RgbImage;
use tracing::{info, warn};

use crate::error::LoadError;
use crate::handle::ModelHandle;
use crate::scratch::ScratchImage;
use crate::traits::{ModelRuntime, OcrEngine, OcrEngineOptions, VisionLoadSpec};
use crate::types::{DevicePreference, Precision, Tier, DEFAULT_VLM_MODEL_ID};

const WARMUP_SIZE: u32 = 64;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub ocr: OcrEngineOptions,
    pub vision_model_id: String,
    pub device: DevicePreference,
    /// Run one throwaway OCR pass after loading.
    pub warmup: bool,
    pub scratch_dir: PathBuf,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            ocr: OcrEngineOptions::default(),
            vision_model_id: DEFAULT_VLM_MODEL_ID.to_string(),
            device: DevicePreference::Auto,
            warmup: true,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Load the backend for `tier`.
pub async fn load_model(
    tier: Tier,
    runtime: &dyn ModelRuntime,
    options: &LoadOptions,
) -> Result<ModelHandle, LoadError> {
    info!(tier = %tier, runtime = runtime.name(), "Initializing bridge backend");

    let handle = match tier {
        Tier::Eco => load_ocr(runtime, options).await?,
        Tier::Lite | Tier::Pro => load_vision(tier, runtime, options).await?,
    };

    handle.check_tier(tier)?;
    info!(tier = %tier, handle = ?handle, "Backend ready");
    Ok(handle)
}

async fn load_ocr(runtime: &dyn ModelRuntime, options: &LoadOptions) -> Result<ModelHandle, LoadError> {
    info!(
        lang = %options.ocr.lang,
        angle_cls = options.ocr.use_angle_cls,
        "Loading standard OCR engine"
    );
    let engine = runtime.load_ocr(&options.ocr).await?;
    info!(engine = engine.name(), "OCR engine initialized");

    if options.warmup {
        warm_up(engine.as_ref(), options).await;
    }
    Ok(ModelHandle::Ocr(engine))
}

/// One inference against a blank image so the first real request is fast.
/// Failures are logged and ignored.
async fn warm_up(engine: &dyn OcrEngine, options: &LoadOptions) {
    info!("Warming up OCR engine");
    let blank = RgbImage::new(WARMUP_SIZE, WARMUP_SIZE);
    let scratch = match ScratchImage::write(&options.scratch_dir, blank).await {
        Ok(scratch) => scratch,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Warmup skipped (safe to ignore)");
            return;
        }
    };
    if let Err(e) = engine.ocr(scratch.path()).await {
        warn!(error = %format!("{e:#}"), "Warmup failed (safe to ignore)");
    }
}

async fn load_vision(
    tier: Tier,
    runtime: &dyn ModelRuntime,
    options: &LoadOptions,
) -> Result<ModelHandle, LoadError> {
    let device = options.device.resolve(runtime.accelerator_available());
    let mut spec = VisionLoadSpec {
        model_id: options.vision_model_id.clone(),
        device,
        precision: tier.precision(),
    };
    info!(
        model = %spec.model_id,
        tier = %tier,
        device = %device,
        precision = %spec.precision,
        "Loading VLM"
    );

    let model = match runtime.load_vision(&spec).await {
        Ok(model) => model,
        Err(LoadError::QuantizationUnavailable(reason)) if spec.precision != Precision::Full => {
            warn!(reason = %reason, "Quantization unavailable, falling back to standard precision");
            spec.precision = Precision::Full;
            runtime.load_vision(&spec).await?
        }
        Err(e) => return Err(e),
    };

    if spec.precision == Precision::Quantized4Bit {
        info!("Using 4-bit quantization");
    }
    Ok(ModelHandle::Vision(model))
}
