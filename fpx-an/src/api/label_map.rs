//! Label map endpoints
//!
//! GET /projects/:pid/label-map
//! PUT /projects/:pid/label-map

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::services::LabelMap;
use crate::AppState;

/// GET /projects/:pid/label-map
pub async fn get_label_map(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<LabelMap>> {
    Ok(Json(state.label_maps.get(project_id).await?))
}

/// PUT /projects/:pid/label-map
///
/// Replaces the stored map as a whole.
pub async fn put_label_map(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(map): Json<LabelMap>,
) -> ApiResult<Json<LabelMap>> {
    if map.keys().any(|k| k.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "Label map keys must not be empty".to_string(),
        ));
    }
    state.label_maps.replace(project_id, &map).await?;
    tracing::info!(project_id, entries = map.len(), "Label map replaced");
    Ok(Json(map))
}

pub fn label_map_routes() -> Router<AppState> {
    Router::new().route(
        "/projects/:project_id/label-map",
        get(get_label_map).put(put_label_map),
    )
}
