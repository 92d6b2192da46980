//! CLI Doctor Command
//!
//! Checks that the configured tier can actually start: config, cache
//! directory, device, and the backend for the tier.

use std::path::Path;

use anyhow::Result;
use ocr_bridge_config::{validate, BridgeConfig, CacheLayout, RuntimeKind};
use ocr_bridge_core::{DevicePreference, ModelRuntime, OcrEngineOptions, Tier};
use ocr_bridge_understanding::local::missing_checkpoint_files;
use ocr_bridge_understanding::{CommandOcrEngine, ExternalRuntime, OcrModelFiles, VisionCheckpoints};

use crate::settings::{
    build_runtime, external_runtime_config, local_runtime_config, resolve_config, CliOverrides,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }

    fn icon(&self) -> &'static str {
        match self.status {
            CheckStatus::Pass => "🟢",
            CheckStatus::Warn => "🟡",
            CheckStatus::Fail => "🔴",
        }
    }
}

/// Executes the full doctor diagnosis. Returns `true` when nothing failed.
pub async fn run(config_path: Option<&Path>, overrides: &CliOverrides) -> Result<bool> {
    println!("\n🔍 Running OCR Bridge Doctor...\n");

    let config = match resolve_config(config_path, overrides).await {
        Ok(config) => config,
        Err(e) => {
            println!("  🔴 config: {e:#}");
            println!("\n❌ Configuration is invalid; remaining checks skipped.");
            return Ok(false);
        }
    };

    let cache = CacheLayout::new(&config.cache.dir);
    let mut checks = vec![check_config(&config), check_cache(&cache).await];

    let runtime = build_runtime(&config, &cache)?;
    checks.push(check_device(config.vlm.device, runtime.accelerator_available()));
    checks.push(match (config.runtime, config.tier) {
        (RuntimeKind::Local, Tier::Eco) => check_ocr_models(&local_runtime_config(&config, &cache).ocr),
        (RuntimeKind::Local, tier) => {
            check_checkpoints(tier, &local_runtime_config(&config, &cache).vision)
        }
        (RuntimeKind::External, Tier::Eco) => check_ocr_command(&config),
        (RuntimeKind::External, _) => {
            let external = ExternalRuntime::new(external_runtime_config(&config, &cache))?;
            check_vlm_endpoint(&config, &external).await
        }
    });

    for check in &checks {
        println!("  {} {}: {}", check.icon(), check.name, check.detail);
    }

    let ok = checks.iter().all(|c| c.status != CheckStatus::Fail);
    println!();
    if ok {
        println!("✅ All checks passed! The {} tier can start.", config.tier);
    } else {
        println!("❌ Some checks failed! Please fix the errors above.");
    }
    Ok(ok)
}

fn check_config(config: &BridgeConfig) -> Check {
    let report = validate(config);
    match report.warnings.first() {
        None => Check::new("config", CheckStatus::Pass, format!("tier {}", config.tier)),
        Some(w) => Check::new("config", CheckStatus::Warn, format!("{}: {}", w.path, w.message)),
    }
}

async fn check_cache(cache: &CacheLayout) -> Check {
    if let Err(e) = cache.ensure_dirs().await {
        return Check::new("cache", CheckStatus::Fail, format!("{e:#}"));
    }
    let marker = cache.root().join(".doctor-write-check");
    match tokio::fs::write(&marker, b"ok").await {
        Ok(()) => {
            let _ = tokio::fs::remove_file(&marker).await;
            Check::new("cache", CheckStatus::Pass, format!("{} is writable", cache.root().display()))
        }
        Err(e) => Check::new(
            "cache",
            CheckStatus::Fail,
            format!("{} is not writable: {e}", cache.root().display()),
        ),
    }
}

fn check_device(preference: DevicePreference, accelerator: bool) -> Check {
    let device = preference.resolve(accelerator);
    let detail = format!("accelerator detected: {accelerator}, using {device}");
    if preference == DevicePreference::Cuda && !accelerator {
        Check::new("device", CheckStatus::Warn, format!("{detail} (cuda forced without a detected GPU)"))
    } else {
        Check::new("device", CheckStatus::Pass, detail)
    }
}

fn check_ocr_models(files: &OcrModelFiles) -> Check {
    let missing = files.missing();
    if !missing.is_empty() {
        let list: Vec<_> = missing.iter().map(|p| p.display().to_string()).collect();
        return Check::new("ocr", CheckStatus::Fail, format!("missing {}", list.join(", ")));
    }
    match &files.textline_orientation_model {
        Some(model) if !model.is_file() => Check::new(
            "ocr",
            CheckStatus::Warn,
            format!("{} not found; angle classification disabled", model.display()),
        ),
        _ => Check::new(
            "ocr",
            CheckStatus::Pass,
            format!("PP-OCRv4 mobile models at {}", files.det_model.display()),
        ),
    }
}

fn check_checkpoints(tier: Tier, vision: &VisionCheckpoints) -> Check {
    let complete = |dir: &Path| missing_checkpoint_files(dir).is_empty();
    if tier == Tier::Lite {
        if let Some(quantized) = vision.quantized.as_deref().filter(|dir| complete(dir)) {
            return Check::new("vlm", CheckStatus::Pass, format!("checkpoint at {}", quantized.display()));
        }
        if complete(&vision.full) {
            return Check::new(
                "vlm",
                CheckStatus::Warn,
                format!("no quantized checkpoint; lite falls back to {}", vision.full.display()),
            );
        }
    } else if complete(&vision.full) {
        return Check::new("vlm", CheckStatus::Pass, format!("checkpoint at {}", vision.full.display()));
    }
    Check::new(
        "vlm",
        CheckStatus::Fail,
        format!(
            "{} is missing {}",
            vision.full.display(),
            missing_checkpoint_files(&vision.full).join(", ")
        ),
    )
}

fn check_ocr_command(config: &BridgeConfig) -> Check {
    let engine = match CommandOcrEngine::new(&config.ocr.command, OcrEngineOptions::default()) {
        Ok(engine) => engine,
        Err(e) => return Check::new("ocr", CheckStatus::Fail, e.to_string()),
    };
    match engine.resolve_program() {
        Some(path) => Check::new("ocr", CheckStatus::Pass, format!("engine at {}", path.display())),
        None => Check::new(
            "ocr",
            CheckStatus::Fail,
            format!("`{}` not found on PATH", engine.program()),
        ),
    }
}

async fn check_vlm_endpoint(config: &BridgeConfig, runtime: &ExternalRuntime) -> Check {
    let served = match runtime.served_models().await {
        Ok(served) => served,
        Err(e) => {
            return Check::new(
                "vlm",
                CheckStatus::Fail,
                format!("{} unreachable: {e:#}", config.vlm.endpoint),
            )
        }
    };
    vlm_check_from_listing(config, &served)
}

fn vlm_check_from_listing(config: &BridgeConfig, served: &[String]) -> Check {
    let has = |id: &str| served.iter().any(|s| s == id);
    if config.tier == Tier::Lite {
        if let Some(quantized) = config.vlm.quantized_model_id.as_deref().filter(|id| has(*id)) {
            return Check::new("vlm", CheckStatus::Pass, format!("serves {quantized}"));
        }
        if has(config.vlm.model_id.as_str()) {
            return Check::new(
                "vlm",
                CheckStatus::Warn,
                format!("no quantized model served; lite falls back to {}", config.vlm.model_id),
            );
        }
    } else if has(config.vlm.model_id.as_str()) {
        return Check::new("vlm", CheckStatus::Pass, format!("serves {}", config.vlm.model_id));
    }
    Check::new(
        "vlm",
        CheckStatus::Fail,
        format!("{} not served (available: {})", config.vlm.model_id, served.join(", ")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lite_prefers_quantized_listing() {
        let mut config = BridgeConfig::default();
        config.tier = Tier::Lite;
        let quantized = config.vlm.quantized_model_id.clone().unwrap();

        let check = vlm_check_from_listing(&config, &ids(&[quantized.as_str()]));
        assert_eq!(check.status, CheckStatus::Pass);

        let check = vlm_check_from_listing(&config, &ids(&[config.vlm.model_id.as_str()]));
        assert_eq!(check.status, CheckStatus::Warn);

        let check = vlm_check_from_listing(&config, &ids(&["other"]));
        assert_eq!(check.status, CheckStatus::Fail);
    }

    #[test]
    fn pro_needs_full_model() {
        let mut config = BridgeConfig::default();
        config.tier = Tier::Pro;
        let check = vlm_check_from_listing(&config, &ids(&["PaddlePaddle/PaddleOCR-VL-1.5-bnb-4bit"]));
        assert_eq!(check.status, CheckStatus::Fail);
        let check = vlm_check_from_listing(&config, &ids(&[config.vlm.model_id.as_str()]));
        assert_eq!(check.status, CheckStatus::Pass);
    }

    #[test]
    fn missing_ocr_program_fails() {
        let mut config = BridgeConfig::default();
        config.ocr.command = vec!["definitely-not-an-ocr-binary-xyz".into()];
        assert_eq!(check_ocr_command(&config).status, CheckStatus::Fail);
        config.ocr.command = vec!["sh".into()];
        assert_eq!(check_ocr_command(&config).status, CheckStatus::Pass);
    }

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ocr-bridge-doctor-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn ocr_models_must_exist() {
        let dir = scratch("ocr");
        let files = OcrModelFiles {
            det_model: dir.join("det.onnx"),
            rec_model: dir.join("rec.onnx"),
            dict: dir.join("keys.txt"),
            textline_orientation_model: Some(dir.join("ori.onnx")),
        };
        let check = check_ocr_models(&files);
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.detail.contains("det.onnx"));

        for file in ["det.onnx", "rec.onnx", "keys.txt"] {
            std::fs::write(dir.join(file), b"x").unwrap();
        }
        assert_eq!(check_ocr_models(&files).status, CheckStatus::Warn);
        std::fs::write(dir.join("ori.onnx"), b"x").unwrap();
        assert_eq!(check_ocr_models(&files).status, CheckStatus::Pass);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn lite_checkpoint_falls_back_to_full() {
        let dir = scratch("vl");
        let vision = VisionCheckpoints {
            full: dir.join("full"),
            quantized: Some(dir.join("4bit")),
            max_tokens: 16,
        };
        assert_eq!(check_checkpoints(Tier::Lite, &vision).status, CheckStatus::Fail);

        std::fs::create_dir_all(&vision.full).unwrap();
        for file in ocr_bridge_understanding::local::CHECKPOINT_FILES {
            std::fs::write(vision.full.join(file), b"{}").unwrap();
        }
        assert_eq!(check_checkpoints(Tier::Lite, &vision).status, CheckStatus::Warn);
        assert_eq!(check_checkpoints(Tier::Pro, &vision).status, CheckStatus::Pass);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn forced_cuda_without_gpu_warns() {
        assert_eq!(check_device(DevicePreference::Cuda, false).status, CheckStatus::Warn);
        assert_eq!(check_device(DevicePreference::Auto, false).status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn cache_check_creates_and_writes() {
        let root = std::env::temp_dir().join(format!("ocr-bridge-doctor-{}", std::process::id()));
        let check = check_cache(&CacheLayout::new(&root)).await;
        assert_eq!(check.status, CheckStatus::Pass);
        assert!(!root.join(".doctor-write-check").exists());
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
