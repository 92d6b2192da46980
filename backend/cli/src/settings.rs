//! Config resolution for the CLI and wiring into backend options.

use std::path::Path;

use anyhow::{Context, Result};
use ocr_bridge_config::{validate, BridgeConfig, CacheLayout, RuntimeKind};
use ocr_bridge_core::{InferenceAdapter, LoadOptions, ModelRuntime, OcrEngineOptions, Tier};
use ocr_bridge_understanding::{
    ExternalRuntime, ExternalRuntimeConfig, LocalRuntime, LocalRuntimeConfig, OcrModelFiles,
    VisionCheckpoints, VisionEndpoint,
};

/// Flags that override the layered config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub tier: Option<Tier>,
    pub port: Option<u16>,
    pub bind: Option<String>,
}

impl CliOverrides {
    pub fn apply(&self, config: &mut BridgeConfig) {
        if let Some(tier) = self.tier {
            config.tier = tier;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
    }
}

/// Defaults, file, env, then flags. Validation errors are fatal.
pub async fn resolve_config(path: Option<&Path>, overrides: &CliOverrides) -> Result<BridgeConfig> {
    let mut config = ocr_bridge_config::load_layered(path)
        .await
        .context("Failed to load configuration")?;
    overrides.apply(&mut config);
    validate(&config).into_result()?;
    Ok(config)
}

/// The runtime selected by `runtime` in the config.
pub fn build_runtime(config: &BridgeConfig, cache: &CacheLayout) -> Result<Box<dyn ModelRuntime>> {
    let runtime: Box<dyn ModelRuntime> = match config.runtime {
        RuntimeKind::Local => Box::new(LocalRuntime::new(local_runtime_config(config, cache))),
        RuntimeKind::External => {
            Box::new(ExternalRuntime::new(external_runtime_config(config, cache))?)
        }
    };
    Ok(runtime)
}

/// Model paths with relative entries resolved into the cache.
pub fn local_runtime_config(config: &BridgeConfig, cache: &CacheLayout) -> LocalRuntimeConfig {
    let ocr = &config.ocr;
    let vlm = &config.vlm;
    LocalRuntimeConfig {
        ocr: OcrModelFiles {
            det_model: cache.ocr_model_path(&ocr.det_model),
            rec_model: cache.ocr_model_path(&ocr.rec_model),
            dict: cache.ocr_model_path(&ocr.dict),
            textline_orientation_model: ocr
                .textline_orientation_model
                .as_deref()
                .map(|path| cache.ocr_model_path(path)),
        },
        vision: VisionCheckpoints {
            full: vlm
                .model_dir
                .clone()
                .unwrap_or_else(|| cache.vlm_model_dir(&vlm.model_id)),
            quantized: vlm.quantized_model_dir.clone().or_else(|| {
                vlm.quantized_model_id
                    .as_deref()
                    .map(|id| cache.vlm_model_dir(id))
            }),
            max_tokens: vlm.max_tokens as usize,
        },
    }
}

pub fn external_runtime_config(config: &BridgeConfig, cache: &CacheLayout) -> ExternalRuntimeConfig {
    ExternalRuntimeConfig {
        ocr_command: config.ocr.command.clone(),
        env: cache.env_pairs(),
        vision: VisionEndpoint {
            base_url: config.vlm.endpoint.clone(),
            quantized_model_id: config.vlm.quantized_model_id.clone(),
            api_key: config.vlm.api_key.clone(),
            max_tokens: config.vlm.max_tokens,
        },
    }
}

pub fn load_options(config: &BridgeConfig) -> LoadOptions {
    LoadOptions {
        ocr: OcrEngineOptions {
            lang: config.ocr.lang.clone(),
            use_angle_cls: config.ocr.use_angle_cls,
        },
        vision_model_id: config.vlm.model_id.clone(),
        device: config.vlm.device,
        warmup: config.ocr.warmup,
        scratch_dir: std::env::temp_dir(),
    }
}

pub fn adapter(config: &BridgeConfig) -> InferenceAdapter {
    InferenceAdapter::new(std::env::temp_dir(), config.vlm.prompt.clone())
}
