//! Health, banner and route listing.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::server::GatewayState;

pub const ROOT_MESSAGE: &str =
    "Vision Event Engine OCR Bridge. Please use the main application at port 3000.";

#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `ok` once the model handle is installed, `loading` before.
    pub status: &'static str,
    pub busy: bool,
    pub tier: String,
    pub model: String,
}

/// Handler for `GET /health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    let ctx = &state.ctx;
    Json(HealthReport {
        status: if ctx.is_ready() { "ok" } else { "loading" },
        busy: ctx.is_busy(),
        tier: ctx.tier().to_string(),
        model: ctx.model_label().to_string(),
    })
}

/// Handler for `GET /`
pub async fn get_root() -> Json<Value> {
    Json(json!({ "message": ROOT_MESSAGE, "docs_url": "/docs" }))
}

/// Handler for `GET /docs`
pub async fn get_docs() -> Json<Value> {
    Json(json!({
        "title": "OCR Bridge",
        "routes": [
            {
                "method": "GET",
                "path": "/health",
                "response": { "status": "ok | loading", "busy": "bool", "tier": "eco | lite | pro", "model": "string" }
            },
            { "method": "GET", "path": "/", "response": { "message": "string", "docs_url": "string" } },
            { "method": "GET", "path": "/docs", "response": "this listing" },
            {
                "method": "POST",
                "path": "/ocr",
                "request": { "image_base64": "string (base64, optional data: URL prefix)" },
                "response": { "result": "string" },
                "errors": {
                    "422": "malformed body or missing image_base64",
                    "500": "decode or inference failure",
                    "503": "model not loaded yet"
                }
            }
        ]
    }))
}
