//! Error types for fpx-an
//!
//! `AnalysisError` is the domain taxonomy shared by parsing, computation and
//! job orchestration. `ApiError` is what HTTP handlers return.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Analysis pipeline and job lifecycle errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// File missing, unreadable or undecodable
    #[error("Failed to read {path}: {reason}")]
    SourceReadError { path: String, reason: String },

    /// A channel number has only one of its two wavelength columns
    #[error("Channel CH{channel} is missing its {missing} wavelength column")]
    MissingChannelPair { channel: u32, missing: String },

    /// Recording has no complete reference/indicator pair
    #[error("No valid channel pairs found in {path}")]
    NoChannelsFound { path: String },

    /// Annotation file lacks a mapped column
    #[error("Column '{column}' not found in {path}")]
    MissingColumn { column: String, path: String },

    /// Baseline or response window collapsed after clamping
    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    /// An algorithm produced zero trials
    #[error("No valid trials for {0}")]
    NoValidTrials(String),

    /// Malformed analysis request (mode-dependent fields, windows, mapping)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Empty or contradictory dataset selection
    #[error("Invalid selection: {0}")]
    SelectionInvalid(String),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Result requested before the job succeeded
    #[error("Result for job {job_id} is not ready (status: {status})")]
    ResultNotReady { job_id: Uuid, status: String },

    /// State-machine move not allowed from the current status
    #[error("Job {job_id} cannot go from {from} to {to}")]
    InvalidTransition { job_id: Uuid, from: String, to: String },

    /// Data catalog collaborator failure
    #[error("Catalog error: {0}")]
    Catalog(#[from] fpx_common::Error),
}

impl AnalysisError {
    pub(crate) fn source_read(path: &std::path::Path, reason: impl ToString) -> Self {
        AnalysisError::SourceReadError {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., result of an unfinished job
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// fpx-common error
    #[error("Common error: {0}")]
    Common(#[from] fpx_common::Error),
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::SelectionInvalid(_) | AnalysisError::InvalidRequest(_) => {
                ApiError::BadRequest(err.to_string())
            }
            AnalysisError::JobNotFound(_) => ApiError::NotFound(err.to_string()),
            AnalysisError::ResultNotReady { .. } => ApiError::Conflict(err.to_string()),
            AnalysisError::Catalog(inner) => ApiError::Common(inner),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => match err {
                fpx_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
                }
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    other.to_string(),
                ),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for the analysis pipeline
pub type PipelineResult<T> = Result<T, AnalysisError>;
