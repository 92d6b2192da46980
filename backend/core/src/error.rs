use thiserror::Error;

/// Request-time failures. Every variant maps to exactly one HTTP failure class.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The model handle has not been installed yet.
    #[error("{0}")]
    NotReady(String),

    /// The payload could not be turned into an image (bad base64, corrupt bytes).
    #[error("{0}")]
    InvalidInput(String),

    /// The backend failed or produced output we do not understand.
    #[error("{0}")]
    Inference(String),
}

impl BridgeError {
    pub fn inference(err: impl std::fmt::Display) -> Self {
        Self::Inference(err.to_string())
    }
}

/// Startup failures raised while loading a backend.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("OCR engine failed to load: {0}")]
    Ocr(String),

    #[error("vision model failed to load: {0}")]
    Vision(String),

    /// The runtime cannot serve a reduced-precision variant.
    #[error("quantization unavailable: {0}")]
    QuantizationUnavailable(String),

    #[error("tier `{tier}` cannot use a {handle} handle")]
    HandleMismatch { tier: String, handle: &'static str },

    #[error("model handle already installed")]
    AlreadyLoaded,
}
