//! Scan submission
//!
//! Lets networked scanners (phones, fixed-mount readers) push decoded
//! payloads into the same frame feed the local scanner uses.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use partscan_common::CodeType;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::frame::{DetectedCode, Frame};
use crate::AppState;

/// POST /scans request body
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
    #[serde(default = "default_code_type")]
    pub code_type: CodeType,
}

fn default_code_type() -> CodeType {
    CodeType::Qr
}

/// POST /scans
///
/// Returns 202: the scan's outcome arrives later on the event stream.
pub async fn submit_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<StatusCode> {
    if request.payload.trim().is_empty() {
        return Err(ApiError::BadRequest("payload must not be empty".to_string()));
    }

    debug!(payload = %request.payload, code_type = %request.code_type, "Scan submitted");
    let frame = Frame::Decoded(vec![DetectedCode::new(request.code_type, request.payload)]);

    if !state.frames.publish(frame) {
        return Err(ApiError::Unavailable("pipeline is not running".to_string()));
    }

    Ok(StatusCode::ACCEPTED)
}

pub fn scan_routes() -> Router<AppState> {
    Router::new().route("/scans", post(submit_scan))
}
