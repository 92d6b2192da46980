//! Model runtime backed by external processes and services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ocr_bridge_core::{
    LoadError, ModelRuntime, OcrEngine, OcrEngineOptions, Precision, VisionLoadSpec, VisionModel,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::device::cuda_available;
use crate::ocr::CommandOcrEngine;
use crate::vision::OpenAiVisionModel;

/// Where the vision-language model is served.
#[derive(Debug, Clone)]
pub struct VisionEndpoint {
    pub base_url: String,
    /// Served id of the 4-bit variant, if one exists.
    pub quantized_model_id: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ExternalRuntimeConfig {
    pub ocr_command: Vec<String>,
    /// Exported to the OCR command (model cache locations).
    pub env: Vec<(String, String)>,
    pub vision: VisionEndpoint,
}

pub struct ExternalRuntime {
    config: ExternalRuntimeConfig,
    client: reqwest::Client,
    accelerator: bool,
}

impl ExternalRuntime {
    pub fn new(config: ExternalRuntimeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            config,
            client,
            accelerator: cuda_available(),
        })
    }

    /// Model ids the VLM endpoint currently serves.
    pub async fn served_models(&self) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/v1/models", self.config.vision.base_url.trim_end_matches('/'));
        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.vision.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?.error_for_status()?;
        let json: Value = resp.json().await?;
        Ok(parse_model_list(&json))
    }
}

#[async_trait]
impl ModelRuntime for ExternalRuntime {
    fn name(&self) -> &str {
        "external"
    }

    fn accelerator_available(&self) -> bool {
        self.accelerator
    }

    async fn load_ocr(&self, options: &OcrEngineOptions) -> Result<Arc<dyn OcrEngine>, LoadError> {
        let engine = CommandOcrEngine::new(&self.config.ocr_command, options.clone())
            .map_err(|e| LoadError::Ocr(e.to_string()))?
            .with_env(self.config.env.clone());
        let resolved = engine.resolve_program().ok_or_else(|| {
            LoadError::Ocr(format!("`{}` not found on PATH", engine.program()))
        })?;
        debug!(program = %resolved.display(), "Resolved OCR command");
        Ok(Arc::new(engine))
    }

    async fn load_vision(&self, spec: &VisionLoadSpec) -> Result<Arc<dyn VisionModel>, LoadError> {
        let served = self
            .served_models()
            .await
            .map_err(|e| LoadError::Vision(format!("{}: {e}", self.config.vision.base_url)))?;
        debug!(?served, "VLM endpoint models");

        let model_id = resolve_served_id(spec, self.config.vision.quantized_model_id.as_deref(), &served)?;
        info!(model = %model_id, device = %spec.device, "VLM endpoint serves model");

        let model = OpenAiVisionModel::new(
            self.client.clone(),
            self.config.vision.base_url.clone(),
            model_id,
            spec.device,
            spec.precision,
        )
        .with_api_key(self.config.vision.api_key.clone())
        .with_max_tokens(self.config.vision.max_tokens);
        Ok(Arc::new(model))
    }
}

/// Pick the served id for `spec`, or explain why it cannot be served.
pub fn resolve_served_id(
    spec: &VisionLoadSpec,
    quantized_model_id: Option<&str>,
    served: &[String],
) -> Result<String, LoadError> {
    match spec.precision {
        Precision::Quantized4Bit => {
            let id = quantized_model_id.ok_or_else(|| {
                LoadError::QuantizationUnavailable("no quantized model configured".into())
            })?;
            if served.iter().any(|s| s == id) {
                Ok(id.to_string())
            } else {
                Err(LoadError::QuantizationUnavailable(format!("`{id}` is not served")))
            }
        }
        Precision::Full => {
            if served.iter().any(|s| s == &spec.model_id) {
                Ok(spec.model_id.clone())
            } else {
                Err(LoadError::Vision(format!(
                    "`{}` is not served (available: {})",
                    spec.model_id,
                    served.join(", ")
                )))
            }
        }
    }
}

/// Ids from an OpenAI-style `{"data": [{"id": ...}]}` listing.
pub fn parse_model_list(json: &Value) -> Vec<String> {
    json["data"]
        .as_array()
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
