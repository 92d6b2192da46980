//! In-process backends for tests. Enabled by `cfg(test)` or the `test-util`
//! feature.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::RgbImage;

use crate::error::LoadError;
use crate::traits::{ChatTurn, ModelRuntime, OcrEngine, OcrEngineOptions, VisionLoadSpec, VisionModel};

/// OCR engine returning a fixed result (or a fixed error).
pub struct StaticOcrEngine {
    output: Result<serde_json::Value, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl StaticOcrEngine {
    pub fn new(output: serde_json::Value) -> Self {
        Self {
            output: Ok(output),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            output: Err(message.to_string()),
            ..Self::new(serde_json::Value::Null)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths the engine was called with, and whether each existed at call time.
    pub fn seen_paths(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OcrEngine for StaticOcrEngine {
    fn name(&self) -> &str {
        "static"
    }

    async fn ocr(&self, image_path: &Path) -> Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((image_path.to_path_buf(), image_path.exists()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.output.clone().map_err(|m| anyhow!(m))
    }
}

/// Vision model replying with a fixed string and recording prompts.
pub struct EchoVisionModel {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl EchoVisionModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VisionModel for EchoVisionModel {
    fn model_id(&self) -> &str {
        "echo-vl"
    }

    async fn chat(&self, _image: &RgbImage, prompt: &str, _history: &[ChatTurn]) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply.clone().map_err(|m| anyhow!(m))
    }
}

/// Runtime handing out the fakes above, with switchable failure modes.
pub struct FakeRuntime {
    pub accelerator: bool,
    pub quantization: bool,
    pub ocr_failure: Option<String>,
    pub vision_failure: Option<String>,
    pub engine: Arc<StaticOcrEngine>,
    pub model: Arc<EchoVisionModel>,
    pub ocr_requests: Mutex<Vec<OcrEngineOptions>>,
    pub vision_requests: Mutex<Vec<VisionLoadSpec>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            accelerator: false,
            quantization: true,
            ocr_failure: None,
            vision_failure: None,
            engine: Arc::new(StaticOcrEngine::new(serde_json::json!([]))),
            model: Arc::new(EchoVisionModel::new("")),
            ocr_requests: Mutex::new(Vec::new()),
            vision_requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRuntime {
    pub fn ocr_requests(&self) -> Vec<OcrEngineOptions> {
        self.ocr_requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn vision_requests(&self) -> Vec<VisionLoadSpec> {
        self.vision_requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelRuntime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    fn accelerator_available(&self) -> bool {
        self.accelerator
    }

    async fn load_ocr(&self, options: &OcrEngineOptions) -> Result<Arc<dyn OcrEngine>, LoadError> {
        if let Ok(mut requests) = self.ocr_requests.lock() {
            requests.push(options.clone());
        }
        match &self.ocr_failure {
            Some(message) => Err(LoadError::Ocr(message.clone())),
            None => Ok(self.engine.clone()),
        }
    }

    async fn load_vision(&self, spec: &VisionLoadSpec) -> Result<Arc<dyn VisionModel>, LoadError> {
        if let Ok(mut requests) = self.vision_requests.lock() {
            requests.push(spec.clone());
        }
        if spec.precision == crate::types::Precision::Quantized4Bit && !self.quantization {
            return Err(LoadError::QuantizationUnavailable("no quantized variant".into()));
        }
        match &self.vision_failure {
            Some(message) => Err(LoadError::Vision(message.clone())),
            None => Ok(self.model.clone()),
        }
    }
}

/// Encode `image` as PNG and return it base64-encoded, as a client would send it.
pub fn encode_png_base64(image: &RgbImage) -> String {
    let mut buf = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("png encoding");
    STANDARD.encode(buf.into_inner())
}
