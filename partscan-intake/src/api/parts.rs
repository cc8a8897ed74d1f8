//! Cache and counter queries

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use partscan_common::{ResolvedPart, ScanCounts};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /parts
///
/// Every resolved part, in the order it was first resolved.
pub async fn list_parts(State(state): State<AppState>) -> Json<Vec<ResolvedPart>> {
    Json(state.store.parts())
}

/// GET /parts/:part_number
pub async fn get_part(
    State(state): State<AppState>,
    Path(part_number): Path<String>,
) -> ApiResult<Json<ResolvedPart>> {
    state
        .store
        .get_part(&part_number)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Part {} is not cached", part_number)))
}

/// GET /counts
pub async fn get_counts(State(state): State<AppState>) -> Json<ScanCounts> {
    Json(state.counters.snapshot())
}

pub fn parts_routes() -> Router<AppState> {
    Router::new()
        .route("/parts", get(list_parts))
        .route("/parts/:part_number", get(get_part))
        .route("/counts", get(get_counts))
}
