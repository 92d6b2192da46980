use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::debug;
use uuid::Uuid;

/// An image written to a transient file. The file is removed on drop.
#[derive(Debug)]
pub struct ScratchImage {
    path: PathBuf,
}

impl ScratchImage {
    /// Write `image` as PNG under `dir` with a unique name.
    pub async fn write(dir: &Path, image: RgbImage) -> Result<Self> {
        let path = dir.join(format!("ocr-bridge-{}.png", Uuid::new_v4()));
        let target = path.clone();
        tokio::task::spawn_blocking(move || image.save(&target))
            .await
            .context("image writer task panicked")?
            .with_context(|| format!("failed to write transient image {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchImage {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "Transient image cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_removed_on_drop() {
        let scratch = ScratchImage::write(&std::env::temp_dir(), RgbImage::new(8, 8))
            .await
            .unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn names_are_unique() {
        let dir = std::env::temp_dir();
        let a = ScratchImage::write(&dir, RgbImage::new(1, 1)).await.unwrap();
        let b = ScratchImage::write(&dir, RgbImage::new(1, 1)).await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = std::env::temp_dir().join(format!("missing-{}", Uuid::new_v4()));
        assert!(ScratchImage::write(&dir, RgbImage::new(1, 1)).await.is_err());
    }
}
