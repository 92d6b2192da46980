//! Optical Character Recognition (OCR)
//!
//! Bridges an external OCR program to the bridge. The program is invoked once
//! per image with the image path on its command line and must print the
//! engine's JSON result on stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ocr_bridge_core::{OcrEngine, OcrEngineOptions};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

/// Placeholder replaced with the image path.
pub const IMAGE_PLACEHOLDER: &str = "{image}";
/// Placeholder replaced with the recognition language.
pub const LANG_PLACEHOLDER: &str = "{lang}";
/// Placeholder replaced with `true`/`false` for angle classification.
pub const ANGLE_CLS_PLACEHOLDER: &str = "{angle_cls}";

/// An OCR engine backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandOcrEngine {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    options: OcrEngineOptions,
}

impl CommandOcrEngine {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String], options: OcrEngineOptions) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("OCR command is empty");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            env: Vec::new(),
            options,
        })
    }

    /// Environment exported to every invocation.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with placeholders substituted for one image.
    pub fn render_args(&self, image_path: &Path) -> Vec<String> {
        let image = image_path.to_string_lossy();
        let angle_cls = if self.options.use_angle_cls { "true" } else { "false" };
        self.args
            .iter()
            .map(|arg| {
                arg.replace(IMAGE_PLACEHOLDER, &image)
                    .replace(LANG_PLACEHOLDER, &self.options.lang)
                    .replace(ANGLE_CLS_PLACEHOLDER, angle_cls)
            })
            .collect()
    }

    /// Locate the program on `PATH`, or check it exists when given as a path.
    pub fn resolve_program(&self) -> Option<PathBuf> {
        resolve_program(&self.program)
    }
}

#[async_trait]
impl OcrEngine for CommandOcrEngine {
    fn name(&self) -> &str {
        &self.program
    }

    async fn ocr(&self, image_path: &Path) -> Result<Value> {
        let args = self.render_args(image_path);
        debug!(program = %self.program, ?args, "Spawning OCR command");

        let output = Command::new(&self.program)
            .args(&args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn OCR command `{}`", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "OCR command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = parse_engine_output(&stdout)?;
        info!(bytes = output.stdout.len(), "OCR command produced output");
        Ok(value)
    }
}

/// Parse the engine's stdout. Engines often log before printing their result,
/// so the last non-empty line is tried when the whole output is not JSON.
pub fn parse_engine_output(stdout: &str) -> Result<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        bail!("OCR command produced no output");
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    let last = trimmed
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    serde_json::from_str(last).context("OCR command output is not JSON")
}

/// Find `program` on `PATH`. Programs containing a path separator are checked
/// directly.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}
