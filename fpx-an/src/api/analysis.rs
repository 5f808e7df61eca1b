//! Analysis job endpoints
//!
//! POST /projects/:pid/analyze
//! GET  /projects/:pid/jobs
//! GET  /projects/:pid/jobs/:job_id
//! GET  /projects/:pid/jobs/:job_id/results

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AnalysisError, ApiError, ApiResult};
use crate::models::{AnalyzeRequest, Job, JobStatus, JobStatusResponse, ResultResponse};
use crate::services::job_registry::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::AppState;

/// POST /projects/:pid/analyze response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreateResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

/// POST /projects/:pid/analyze
///
/// Validates synchronously; an invalid request never creates a job.
pub async fn submit_analysis(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<JobCreateResponse>)> {
    let request: AnalyzeRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::BadRequest(format!("Malformed analysis request: {}", e)))?;
    let (selection, mut params) = request.validate()?;

    if params.label_mapping.is_empty() {
        params.label_mapping = state
            .label_maps
            .get(project_id)
            .await?
            .into_iter()
            .collect();
    }

    let (job, _handle) = state
        .runner
        .submit(project_id, selection, params, body)
        .await;

    tracing::info!(
        job_id = %job.job_id,
        project_id,
        "Analysis job submitted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(JobCreateResponse {
            job_id: job.job_id,
            status: job.status,
            message: "Analysis task created".to_string(),
        }),
    ))
}

/// Job of this project, or 404
async fn project_job(state: &AppState, project_id: i64, job_id: Uuid) -> ApiResult<Job> {
    let job = state.registry.get(job_id).await?;
    if job.project_id != project_id {
        return Err(AnalysisError::JobNotFound(job_id).into());
    }
    Ok(job)
}

/// GET /projects/:pid/jobs?skip&limit
pub async fn list_jobs(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<JobStatusResponse>> {
    let limit = query.limit.clamp(1, MAX_LIST_LIMIT);
    let jobs = state.registry.list(project_id, query.skip, limit).await;
    Json(jobs.iter().map(Job::status_response).collect())
}

/// GET /projects/:pid/jobs/:job_id
pub async fn get_job_status(
    State(state): State<AppState>,
    Path((project_id, job_id)): Path<(i64, Uuid)>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = project_job(&state, project_id, job_id).await?;
    tracing::debug!(job_id = %job_id, status = %job.status, "Status query");
    Ok(Json(job.status_response()))
}

/// GET /projects/:pid/jobs/:job_id/results
///
/// 409 while the job has not succeeded.
pub async fn get_job_result(
    State(state): State<AppState>,
    Path((project_id, job_id)): Path<(i64, Uuid)>,
) -> ApiResult<Json<ResultResponse>> {
    project_job(&state, project_id, job_id).await?;
    let result = state.registry.result(job_id).await?;
    Ok(Json(result.as_ref().clone()))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/projects/:project_id/analyze", post(submit_analysis))
        .route("/projects/:project_id/jobs", get(list_jobs))
        .route("/projects/:project_id/jobs/:job_id", get(get_job_status))
        .route(
            "/projects/:project_id/jobs/:job_id/results",
            get(get_job_result),
        )
}
