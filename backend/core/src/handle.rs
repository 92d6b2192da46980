use std::fmt;
use std::sync::Arc;

use crate::error::LoadError;
use crate::traits::{OcrEngine, VisionModel};
use crate::types::Tier;

/// The loaded backend. Exactly one kind is ever populated.
#[derive(Clone)]
pub enum ModelHandle {
    Ocr(Arc<dyn OcrEngine>),
    Vision(Arc<dyn VisionModel>),
}

impl ModelHandle {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelHandle::Ocr(_) => "ocr",
            ModelHandle::Vision(_) => "vision",
        }
    }

    /// Check that this handle can serve `tier`.
    pub fn check_tier(&self, tier: Tier) -> Result<(), LoadError> {
        match (self, tier.is_vision()) {
            (ModelHandle::Ocr(_), false) | (ModelHandle::Vision(_), true) => Ok(()),
            _ => Err(LoadError::HandleMismatch {
                tier: tier.to_string(),
                handle: self.kind(),
            }),
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelHandle::Ocr(engine) => f.debug_tuple("Ocr").field(&engine.name()).finish(),
            ModelHandle::Vision(model) => f.debug_tuple("Vision").field(&model.model_id()).finish(),
        }
    }
}
