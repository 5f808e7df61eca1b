//! Analysis job state machine
//!
//! queued → running → succeeded | failed
//!
//! `failed` is reachable from any non-terminal state. Terminal jobs never
//! change again. Progress only moves forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{AnalysisError, PipelineResult};

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, waiting for the worker to pick it up
    Queued,
    /// Worker is executing the pipeline
    Running,
    /// Result written
    Succeeded,
    /// Pipeline raised an error
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Allowed edges of the state machine
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory job record (also the `status.json` snapshot shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: Uuid,
    pub project_id: i64,
    pub status: JobStatus,
    /// Percent complete (0-100)
    pub progress: u8,
    /// Current stage description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Submitted request, verbatim
    pub params: serde_json::Value,
    /// Snapshot directory, if persistence is configured
    pub persist_dir: Option<PathBuf>,
    /// Where the final result was written
    pub result_location: Option<PathBuf>,
}

/// Status poll response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub project_id: i64,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a queued job
    pub fn new(project_id: i64, params: serde_json::Value, persist_dir: Option<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            project_id,
            status: JobStatus::Queued,
            progress: 0,
            message: "Task queued".to_string(),
            error: None,
            created_at: now,
            updated_at: now,
            params,
            persist_dir,
            result_location: None,
        }
    }

    fn transition_to(&mut self, next: JobStatus) -> PipelineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AnalysisError::InvalidTransition {
                job_id: self.job_id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// queued → running
    pub fn start(&mut self, message: impl Into<String>) -> PipelineResult<()> {
        self.transition_to(JobStatus::Running)?;
        self.message = message.into();
        Ok(())
    }

    /// Report progress while running
    ///
    /// A lower value than the current one leaves progress unchanged.
    pub fn update_progress(&mut self, progress: u8, message: impl Into<String>) -> PipelineResult<()> {
        if self.status != JobStatus::Running {
            return Err(AnalysisError::InvalidTransition {
                job_id: self.job_id,
                from: self.status.to_string(),
                to: "progress update".to_string(),
            });
        }
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// running → succeeded
    pub fn complete(&mut self, result_location: Option<PathBuf>) -> PipelineResult<()> {
        self.transition_to(JobStatus::Succeeded)?;
        self.progress = 100;
        self.message = "Analysis completed successfully".to_string();
        self.result_location = result_location;
        Ok(())
    }

    /// queued | running → failed, keeping the last progress value
    pub fn fail(&mut self, error: impl Into<String>) -> PipelineResult<()> {
        self.transition_to(JobStatus::Failed)?;
        self.message = "Analysis failed".to_string();
        self.error = Some(error.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn status_response(&self) -> JobStatusResponse {
        JobStatusResponse {
            job_id: self.job_id,
            project_id: self.project_id,
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
