//! Model cache directory layout.
//!
//! All backend downloads land under one root so the bridge never writes to the
//! user's global caches.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ocr_dir(&self) -> PathBuf {
        self.root.join("ocr")
    }

    pub fn paddlex_dir(&self) -> PathBuf {
        self.root.join("paddlex")
    }

    pub fn hf_dir(&self) -> PathBuf {
        self.root.join("hf")
    }

    /// `path` itself when absolute, otherwise relative to [`Self::ocr_dir`].
    pub fn ocr_model_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.ocr_dir().join(path)
        }
    }

    /// Checkpoint directory for a hub-style id such as `org/name`.
    pub fn vlm_model_dir(&self, model_id: &str) -> PathBuf {
        self.hf_dir().join(model_id)
    }

    /// Variables exported to backend processes.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("PADDLE_HOME".into(), self.ocr_dir().display().to_string()),
            ("PADDLEX_HOME".into(), self.paddlex_dir().display().to_string()),
            ("HF_HOME".into(), self.hf_dir().display().to_string()),
            ("PADDLE_PDX_DISABLE_MODEL_SOURCE_CHECK".into(), "True".into()),
        ]
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.ocr_dir(), self.paddlex_dir(), self.hf_dir()] {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        }
        debug!(root = %self.root.display(), "Cache directories ready");
        Ok(())
    }
}
