pub mod device;
pub mod local;
pub mod ocr;
pub mod runtime;
pub mod vision;

pub use device::cuda_available;
pub use local::{
    LocalRuntime, LocalRuntimeConfig, OarOcrEngine, OcrModelFiles, PaddleVlModel, VisionCheckpoints,
};
pub use ocr::{resolve_program, CommandOcrEngine};
pub use runtime::{ExternalRuntime, ExternalRuntimeConfig, VisionEndpoint};
pub use vision::OpenAiVisionModel;
