//! Background execution of analysis jobs
//!
//! Submission only creates the job and hands it to a spawned task. The task
//! talks back exclusively through the registry's transitions, and every error
//! or panic below it ends as a `failed` job.

use anyhow::anyhow;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use super::dataset_assembler::{assemble_datasets, PairingPolicy};
use super::data_selector::resolve_selection;
use super::job_registry::JobRegistry;
use crate::db::DataCatalog;
use crate::engine;
use crate::error::AnalysisError;
use crate::models::{AnalysisParams, Job, ResultMeta, ResultResponse, Selection};

/// Everything a job needs besides its own parameters
#[derive(Clone)]
pub struct AnalysisRunner {
    registry: Arc<JobRegistry>,
    catalog: Arc<dyn DataCatalog>,
    policy: Arc<dyn PairingPolicy>,
    uploads_dir: PathBuf,
}

/// One submitted analysis
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub job_id: Uuid,
    pub project_id: i64,
    pub selection: Selection,
    pub params: AnalysisParams,
    /// Request body as submitted, echoed in the result metadata
    pub request: serde_json::Value,
}

impl AnalysisRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        catalog: Arc<dyn DataCatalog>,
        policy: Arc<dyn PairingPolicy>,
        uploads_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            catalog,
            policy,
            uploads_dir,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Create a queued job and start executing it in the background
    pub async fn submit(
        &self,
        project_id: i64,
        selection: Selection,
        params: AnalysisParams,
        request: serde_json::Value,
    ) -> (Job, JoinHandle<()>) {
        let job = self.registry.create(project_id, request.clone()).await;
        let task = AnalysisTask {
            job_id: job.job_id,
            project_id,
            selection,
            params,
            request,
        };

        let runner = self.clone();
        let handle = tokio::spawn(async move {
            runner.run(task).await;
        });
        (job, handle)
    }

    /// Execute a task, converting any failure into a `failed` transition
    pub async fn run(&self, task: AnalysisTask) {
        let job_id = task.job_id;
        info!(job_id = %job_id, project_id = task.project_id, "Background analysis task started");

        if let Err(e) = self.registry.start(job_id, "Analysis started").await {
            error!(job_id = %job_id, error = %e, "Job could not be started");
            return;
        }

        let outcome = AssertUnwindSafe(self.execute(task))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(anyhow!("analysis task panicked: {}", panic_message(panic.as_ref())))
            });

        match outcome {
            Ok(result) => {
                if let Err(e) = self.registry.complete(job_id, result).await {
                    error!(job_id = %job_id, error = %e, "Job could not be completed");
                }
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Analysis failed");
                if let Err(e) = self.registry.fail(job_id, &format!("{:#}", e)).await {
                    error!(job_id = %job_id, error = %e, "Job could not be marked failed");
                }
            }
        }
    }

    async fn progress(&self, job_id: Uuid, progress: u8, message: &str) -> anyhow::Result<()> {
        self.registry.update(job_id, progress, message).await?;
        Ok(())
    }

    async fn execute(&self, task: AnalysisTask) -> anyhow::Result<ResultResponse> {
        let AnalysisTask {
            job_id,
            project_id,
            selection,
            params,
            request,
        } = task;

        self.progress(job_id, 5, "Resolving data selection...").await?;
        let items = resolve_selection(self.catalog.as_ref(), project_id, &selection).await?;
        if items.is_empty() {
            return Err(AnalysisError::SelectionInvalid(
                "no data items matched the selection".to_string(),
            )
            .into());
        }
        self.progress(job_id, 10, &format!("Found {} data items", items.len()))
            .await?;

        self.progress(job_id, 20, "Building datasets...").await?;
        let params = Arc::new(params);
        let datasets = {
            let policy = Arc::clone(&self.policy);
            let uploads_dir = self.uploads_dir.clone();
            let params = Arc::clone(&params);
            tokio::task::spawn_blocking(move || {
                assemble_datasets(&items, &uploads_dir, policy.as_ref(), &params)
            })
            .await
            .map_err(|e| anyhow!("dataset assembly task panicked: {}", e))?
        };
        if datasets.is_empty() {
            return Err(anyhow!("No valid datasets could be built from the selection"));
        }
        let dataset_count = datasets.len();
        self.progress(job_id, 40, &format!("Built {} dataset(s)", dataset_count))
            .await?;

        self.progress(job_id, 50, "Running analysis algorithm...").await?;
        let analysis = {
            let params = Arc::clone(&params);
            tokio::task::spawn_blocking(move || engine::analyze(&datasets, &params))
                .await
                .map_err(|e| anyhow!("analysis task panicked: {}", e))??
        };

        self.progress(job_id, 80, "Formatting results...").await?;
        let response = ResultResponse {
            job_id,
            meta: ResultMeta {
                project_id,
                sampling_rate_hz: params.sampling_rate,
                mode: params.mode.name().to_string(),
                params: request,
                tags_used: selection.tags_used(),
                dataset_count,
                analysis: analysis.metadata,
            },
            matrices: analysis.matrices,
            curves: analysis.curves,
        };

        self.progress(job_id, 90, "Saving results...").await?;
        Ok(response)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
