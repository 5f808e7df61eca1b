//! File preview endpoint
//!
//! POST /preview

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AnalysisError, ApiError, ApiResult};
use crate::services::csv_preview::{preview_file, DEFAULT_PREVIEW_ROWS};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub data_item_id: i64,
    #[serde(default = "default_rows")]
    pub max_rows: usize,
}

fn default_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub data_item_id: i64,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_rows: usize,
}

/// POST /preview
pub async fn preview_data_item(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let item = state
        .catalog
        .get_item(request.data_item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Data item {}", request.data_item_id)))?;

    let path = state.layout.uploads_dir().join(&item.file_path);
    if !path.is_file() {
        return Err(ApiError::NotFound(format!(
            "File of data item {} is missing",
            item.id
        )));
    }

    let max_rows = request.max_rows;
    let table = tokio::task::spawn_blocking(move || preview_file(&path, max_rows))
        .await
        .map_err(|e| ApiError::Internal(format!("Preview task failed: {}", e)))?
        .map_err(|e| match e {
            AnalysisError::SourceReadError { .. } => ApiError::BadRequest(e.to_string()),
            other => other.into(),
        })?;

    Ok(Json(PreviewResponse {
        data_item_id: item.id,
        columns: table.columns,
        rows: table.rows,
        total_rows: table.total_rows,
    }))
}

pub fn preview_routes() -> Router<AppState> {
    Router::new().route("/preview", post(preview_data_item))
}
