//! In-process runtime.
//!
//! The eco tier runs the PP-OCRv4 mobile detection/recognition pair through
//! the oar-ocr ONNX pipeline. The vision tiers load a PaddleOCR-VL checkpoint
//! with candle on the resolved device.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::RgbImage;
use oar_ocr::oarocr::{OAROCR, OAROCRBuilder};
use oar_ocr::vl::{PaddleOcrVl, PaddleOcrVlTask};
use ocr_bridge_core::{
    ChatTurn, Device, LoadError, ModelRuntime, OcrEngine, OcrEngineOptions, Precision,
    VisionLoadSpec, VisionModel,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::device::cuda_available;

/// Files a PaddleOCR-VL checkpoint directory must contain.
pub const CHECKPOINT_FILES: [&str; 4] = [
    "config.json",
    "preprocessor_config.json",
    "tokenizer.json",
    "model.safetensors",
];

/// Model files for the PP-OCRv4 mobile pipeline.
#[derive(Debug, Clone)]
pub struct OcrModelFiles {
    pub det_model: PathBuf,
    pub rec_model: PathBuf,
    pub dict: PathBuf,
    pub textline_orientation_model: Option<PathBuf>,
}

impl OcrModelFiles {
    /// Required files that are not on disk.
    pub fn missing(&self) -> Vec<&Path> {
        [&self.det_model, &self.rec_model, &self.dict]
            .into_iter()
            .filter(|path| !path.is_file())
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Checkpoints for the vision tiers.
#[derive(Debug, Clone)]
pub struct VisionCheckpoints {
    pub full: PathBuf,
    /// Reduced-precision export served to `lite`.
    pub quantized: Option<PathBuf>,
    pub max_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct LocalRuntimeConfig {
    pub ocr: OcrModelFiles,
    pub vision: VisionCheckpoints,
}

pub struct LocalRuntime {
    config: LocalRuntimeConfig,
    accelerator: bool,
}

impl LocalRuntime {
    pub fn new(config: LocalRuntimeConfig) -> Self {
        Self {
            config,
            accelerator: candle_core::utils::cuda_is_available() && cuda_available(),
        }
    }
}

#[async_trait]
impl ModelRuntime for LocalRuntime {
    fn name(&self) -> &str {
        "local"
    }

    fn accelerator_available(&self) -> bool {
        self.accelerator
    }

    async fn load_ocr(&self, options: &OcrEngineOptions) -> Result<Arc<dyn OcrEngine>, LoadError> {
        let files = self.config.ocr.clone();
        let options = options.clone();
        let engine = tokio::task::spawn_blocking(move || OarOcrEngine::build(&files, &options))
            .await
            .map_err(|e| LoadError::Ocr(format!("OCR loader task failed: {e}")))??;
        Ok(Arc::new(engine))
    }

    async fn load_vision(&self, spec: &VisionLoadSpec) -> Result<Arc<dyn VisionModel>, LoadError> {
        let dir = checkpoint_dir(&self.config.vision, spec.precision)?;
        let device = candle_device(spec.device);
        info!(
            model = %spec.model_id,
            dir = %dir.display(),
            device = ?device,
            precision = %spec.precision,
            "Loading PaddleOCR-VL checkpoint"
        );

        let precision = spec.precision;
        let loaded = tokio::task::spawn_blocking(move || PaddleOcrVl::from_dir(&dir, device))
            .await
            .map_err(|e| LoadError::Vision(format!("VLM loader task failed: {e}")))?;
        let vl = loaded.map_err(|e| match precision {
            Precision::Quantized4Bit => LoadError::QuantizationUnavailable(e.to_string()),
            Precision::Full => LoadError::Vision(e.to_string()),
        })?;

        Ok(Arc::new(PaddleVlModel {
            model_id: spec.model_id.clone(),
            vl: Arc::new(vl),
            max_tokens: self.config.vision.max_tokens,
        }))
    }
}

/// Place the model on candle's device. A CUDA device that fails to
/// initialize falls back to the CPU.
pub fn candle_device(device: Device) -> candle_core::Device {
    match device {
        Device::Cpu => candle_core::Device::Cpu,
        Device::Cuda => match candle_core::Device::new_cuda(0) {
            Ok(cuda) => cuda,
            Err(e) => {
                warn!(error = %e, "CUDA device unavailable, loading on CPU");
                candle_core::Device::Cpu
            }
        },
    }
}

/// Checkpoint directory to load for `precision`.
///
/// A missing reduced-precision checkpoint is reported as
/// [`LoadError::QuantizationUnavailable`] so the loader retries at full
/// precision.
pub fn checkpoint_dir(checkpoints: &VisionCheckpoints, precision: Precision) -> Result<PathBuf, LoadError> {
    match precision {
        Precision::Full => {
            let missing = missing_checkpoint_files(&checkpoints.full);
            if missing.is_empty() {
                Ok(checkpoints.full.clone())
            } else {
                Err(LoadError::Vision(format!(
                    "{} is missing {}",
                    checkpoints.full.display(),
                    missing.join(", ")
                )))
            }
        }
        Precision::Quantized4Bit => {
            let dir = checkpoints.quantized.as_ref().ok_or_else(|| {
                LoadError::QuantizationUnavailable("no quantized checkpoint configured".into())
            })?;
            let missing = missing_checkpoint_files(dir);
            if missing.is_empty() {
                Ok(dir.clone())
            } else {
                Err(LoadError::QuantizationUnavailable(format!(
                    "{} is missing {}",
                    dir.display(),
                    missing.join(", ")
                )))
            }
        }
    }
}

pub fn missing_checkpoint_files(dir: &Path) -> Vec<&'static str> {
    CHECKPOINT_FILES
        .into_iter()
        .filter(|file| !dir.join(file).is_file())
        .collect()
}

/// PP-OCRv4 mobile running in-process.
pub struct OarOcrEngine {
    pipeline: Arc<OAROCR>,
}

impl OarOcrEngine {
    pub fn build(files: &OcrModelFiles, options: &OcrEngineOptions) -> Result<Self, LoadError> {
        let missing = files.missing();
        if !missing.is_empty() {
            let list: Vec<_> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(LoadError::Ocr(format!("model files not found: {}", list.join(", "))));
        }

        let mut builder = OAROCRBuilder::new(
            files.det_model.clone(),
            files.rec_model.clone(),
            files.dict.clone(),
        );
        if options.use_angle_cls {
            match &files.textline_orientation_model {
                Some(model) if model.is_file() => {
                    builder = builder.with_text_line_orientation_classification(model.clone());
                }
                Some(model) => warn!(
                    model = %model.display(),
                    "Angle classifier not found, continuing without it"
                ),
                None => {}
            }
        }
        debug!(lang = %options.lang, dict = %files.dict.display(), "Building OCR pipeline");

        let pipeline = builder.build().map_err(|e| LoadError::Ocr(e.to_string()))?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
        })
    }
}

#[async_trait]
impl OcrEngine for OarOcrEngine {
    fn name(&self) -> &str {
        "oar-ocr"
    }

    async fn ocr(&self, image_path: &Path) -> Result<Value> {
        let pipeline = Arc::clone(&self.pipeline);
        let path = image_path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || -> Result<Vec<Value>> {
            let image = oar_ocr::utils::load_image(&path)
                .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
            let results = pipeline
                .predict(vec![image])
                .map_err(|e| anyhow!("OCR pipeline failed: {e}"))?;
            Ok(results
                .iter()
                .map(|result| {
                    structured_page(
                        result
                            .text_regions
                            .iter()
                            .filter_map(|region| region.text_with_confidence()),
                    )
                })
                .collect())
        })
        .await
        .context("OCR task failed")??;
        Ok(Value::Array(pages))
    }
}

/// One page in the structured result layout.
pub fn structured_page<'a>(regions: impl IntoIterator<Item = (&'a str, f32)>) -> Value {
    let (texts, scores): (Vec<&str>, Vec<f32>) = regions.into_iter().unzip();
    json!({ "rec_texts": texts, "rec_scores": scores })
}

/// PaddleOCR-VL running in-process.
pub struct PaddleVlModel {
    model_id: String,
    vl: Arc<PaddleOcrVl>,
    max_tokens: usize,
}

#[async_trait]
impl VisionModel for PaddleVlModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn chat(&self, image: &RgbImage, prompt: &str, history: &[ChatTurn]) -> Result<String> {
        if !history.is_empty() {
            debug!(turns = history.len(), "PaddleOCR-VL does not take chat history");
        }
        let task = task_for_prompt(prompt);
        info!(model = %self.model_id, ?task, "[Vision] Reading image");

        let vl = Arc::clone(&self.vl);
        let image = image.clone();
        let max_tokens = self.max_tokens;
        tokio::task::spawn_blocking(move || vl.generate(image, task, max_tokens))
            .await
            .context("VLM task failed")?
            .map_err(|e| anyhow!("PaddleOCR-VL generation failed: {e}"))
    }
}

/// PaddleOCR-VL answers fixed task prompts; anything else is read as OCR.
pub fn task_for_prompt(prompt: &str) -> PaddleOcrVlTask {
    let prompt = prompt.trim();
    [
        PaddleOcrVlTask::Table,
        PaddleOcrVlTask::Chart,
        PaddleOcrVlTask::Formula,
    ]
    .into_iter()
    .find(|task| prompt.eq_ignore_ascii_case(task.prompt()))
    .unwrap_or(PaddleOcrVlTask::Ocr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_bridge_core::{OcrResult, DEFAULT_EXTRACTION_PROMPT};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ocr-bridge-local-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_checkpoint(dir: &Path) {
        for file in CHECKPOINT_FILES {
            std::fs::write(dir.join(file), b"{}").unwrap();
        }
    }

    fn runtime(dir: &Path) -> LocalRuntime {
        LocalRuntime::new(LocalRuntimeConfig {
            ocr: OcrModelFiles {
                det_model: dir.join("det.onnx"),
                rec_model: dir.join("rec.onnx"),
                dict: dir.join("keys.txt"),
                textline_orientation_model: None,
            },
            vision: VisionCheckpoints {
                full: dir.join("full"),
                quantized: Some(dir.join("4bit")),
                max_tokens: 64,
            },
        })
    }

    #[test]
    fn pages_flow_into_structured_results() {
        let page = structured_page([("Invoice", 0.99), ("#123", 0.97)]);
        assert_eq!(page["rec_scores"].as_array().unwrap().len(), 2);
        let result = OcrResult::from_value(Value::Array(vec![page])).unwrap();
        assert_eq!(result.shape(), "structured");
        assert_eq!(result.text(), "Invoice #123");

        let blank = structured_page(Vec::<(&str, f32)>::new());
        let empty = OcrResult::from_value(Value::Array(vec![blank])).unwrap();
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn quantized_checkpoint_missing_allows_fallback() {
        let dir = scratch("ckpt");
        let full = dir.join("full");
        std::fs::create_dir_all(&full).unwrap();
        write_checkpoint(&full);
        let checkpoints = VisionCheckpoints {
            full: full.clone(),
            quantized: Some(dir.join("4bit")),
            max_tokens: 16,
        };

        let err = checkpoint_dir(&checkpoints, Precision::Quantized4Bit).unwrap_err();
        assert!(matches!(err, LoadError::QuantizationUnavailable(_)));
        assert_eq!(checkpoint_dir(&checkpoints, Precision::Full).unwrap(), full);

        let unconfigured = VisionCheckpoints { quantized: None, ..checkpoints };
        assert!(matches!(
            checkpoint_dir(&unconfigured, Precision::Quantized4Bit),
            Err(LoadError::QuantizationUnavailable(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn incomplete_full_checkpoint_is_fatal() {
        let dir = scratch("partial");
        std::fs::write(dir.join("config.json"), b"{}").unwrap();
        let checkpoints = VisionCheckpoints {
            full: dir.clone(),
            quantized: None,
            max_tokens: 16,
        };
        match checkpoint_dir(&checkpoints, Precision::Full) {
            Err(LoadError::Vision(msg)) => assert!(msg.contains("model.safetensors"), "{msg}"),
            other => panic!("expected a vision load error, got {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cpu_device_maps_to_candle_cpu() {
        assert!(candle_device(Device::Cpu).is_cpu());
        if !candle_core::utils::cuda_is_available() {
            assert!(candle_device(Device::Cuda).is_cpu());
        }
    }

    #[test]
    fn task_prompts_select_tasks() {
        assert_eq!(task_for_prompt(DEFAULT_EXTRACTION_PROMPT), PaddleOcrVlTask::Ocr);
        assert_eq!(task_for_prompt("Table Recognition:"), PaddleOcrVlTask::Table);
        assert_eq!(task_for_prompt(" formula recognition: "), PaddleOcrVlTask::Formula);
    }

    #[tokio::test]
    async fn missing_ocr_models_fail_load() {
        let dir = scratch("ocr");
        let err = runtime(&dir).load_ocr(&OcrEngineOptions::default()).await.err().unwrap();
        match err {
            LoadError::Ocr(msg) => assert!(msg.contains("det.onnx"), "{msg}"),
            other => panic!("expected an OCR load error, got {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unreadable_quantized_checkpoint_allows_fallback() {
        let dir = scratch("vl");
        let quantized = dir.join("4bit");
        std::fs::create_dir_all(&quantized).unwrap();
        write_checkpoint(&quantized);

        let spec = VisionLoadSpec {
            model_id: "PaddlePaddle/PaddleOCR-VL-1.5".into(),
            device: Device::Cpu,
            precision: Precision::Quantized4Bit,
        };
        let err = runtime(&dir).load_vision(&spec).await.err().unwrap();
        assert!(matches!(err, LoadError::QuantizationUnavailable(_)), "{err}");

        let spec = VisionLoadSpec { precision: Precision::Full, ..spec };
        let err = runtime(&dir).load_vision(&spec).await.err().unwrap();
        assert!(matches!(err, LoadError::Vision(_)), "{err}");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
