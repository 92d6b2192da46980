//! HTTP error bodies. Every failure is `{"detail": "..."}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ocr_bridge_core::BridgeError;
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Map a bridge failure to a status. Undecodable input is 500 unless
    /// `strict_client_errors` asks for 400.
    pub fn from_bridge(err: BridgeError, strict_client_errors: bool) -> Self {
        let status = match &err {
            BridgeError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::InvalidInput(_) if strict_client_errors => StatusCode::BAD_REQUEST,
            BridgeError::InvalidInput(_) | BridgeError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Oversized bodies keep their 413.
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), detail = %self.detail, "Request failed");
        } else {
            warn!(status = self.status.as_u16(), detail = %self.detail, "Request rejected");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_errors_map_to_status() {
        let not_ready = ApiError::from_bridge(BridgeError::NotReady("VLM not loaded".into()), false);
        assert_eq!(not_ready.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(not_ready.detail, "VLM not loaded");

        let bad = BridgeError::InvalidInput("invalid base64".into());
        assert_eq!(
            ApiError::from_bridge(bad, false).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let bad = BridgeError::InvalidInput("invalid base64".into());
        assert_eq!(ApiError::from_bridge(bad, true).status, StatusCode::BAD_REQUEST);

        let failed = BridgeError::Inference("engine crashed".into());
        assert_eq!(
            ApiError::from_bridge(failed, true).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
