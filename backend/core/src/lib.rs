pub mod adapter;
pub mod context;
pub mod error;
pub mod handle;
pub mod image_input;
pub mod loader;
pub mod ocr_result;
pub mod scratch;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use adapter::InferenceAdapter;
pub use context::AppContext;
pub use error::{BridgeError, LoadError};
pub use handle::ModelHandle;
pub use image_input::decode_image_payload;
pub use loader::{load_model, LoadOptions};
pub use ocr_result::{OcrResult, OcrShapeError};
pub use scratch::ScratchImage;
pub use traits::{ChatTurn, ModelRuntime, OcrEngine, OcrEngineOptions, VisionLoadSpec, VisionModel};
pub use types::{
    Device, DevicePreference, InferenceResult, Precision, Tier, DEFAULT_EXTRACTION_PROMPT,
    DEFAULT_VLM_MODEL_ID, ECO_MODEL_LABEL,
};
