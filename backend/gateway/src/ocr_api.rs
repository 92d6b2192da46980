//! `POST /ocr`.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct OcrRequest {
    pub image_base64: String,
}

#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub result: String,
}

pub async fn post_ocr(
    State(state): State<GatewayState>,
    payload: Result<Json<OcrRequest>, JsonRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    let Json(request) = payload?;

    let outcome = state
        .ctx
        .process(&request.image_base64)
        .await
        .map_err(|e| ApiError::from_bridge(e, state.strict_client_errors))?;

    info!(tier = %outcome.tier, "OCR request completed");
    Ok(Json(OcrResponse {
        result: outcome.text,
    }))
}
