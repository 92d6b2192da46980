//! OCR bridge HTTP gateway.
//!
//! Health probing, a root banner, a route listing and the `/ocr` endpoint.

pub mod error;
pub mod health_api;
pub mod ocr_api;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, serve, start_server, GatewayState};
