//! Base64 image payload decoding.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::RgbImage;

use crate::error::BridgeError;

/// Decode a base64 image payload into an RGB pixel buffer.
///
/// Embedded whitespace is ignored and a leading `data:<mime>;base64,` prefix is
/// stripped, so payloads copied from data URLs work unchanged.
pub fn decode_image_payload(payload: &str) -> Result<RgbImage, BridgeError> {
    let bytes = decode_base64(payload)?;
    decode_image_bytes(&bytes)
}

pub fn decode_base64(payload: &str) -> Result<Vec<u8>, BridgeError> {
    let trimmed = payload.trim();
    let body = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| BridgeError::InvalidInput("data URLs must specify base64 encoding".into()))?,
        None => trimmed,
    };

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(BridgeError::InvalidInput("image payload is empty".into()));
    }

    STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| BridgeError::InvalidInput(format!("invalid base64 image payload: {err}")))
}

pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbImage, BridgeError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|err| BridgeError::InvalidInput(format!("failed to decode image: {err}")))
}
