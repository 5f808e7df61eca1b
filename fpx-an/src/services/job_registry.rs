//! Job registry
//!
//! Owns every job of the process behind one `RwLock`. Each transition is a
//! single short write-lock section, so readers always see a consistent
//! status/progress/message triple. Snapshot files and events are produced
//! after the lock is released.

use chrono::{Duration, Utc};
use fpx_common::config::RootLayout;
use fpx_common::events::{EventBus, FpxEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job_persistence;
use crate::error::{AnalysisError, PipelineResult};
use crate::models::{Job, JobStatus, ResultResponse};

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 200;

struct JobEntry {
    job: Job,
    result: Option<Arc<ResultResponse>>,
}

pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, JobEntry>>,
    layout: Option<RootLayout>,
    event_bus: Option<EventBus>,
}

impl JobRegistry {
    /// Registry persisting snapshots under `layout` and publishing on `event_bus`
    pub fn new(layout: Option<RootLayout>, event_bus: Option<EventBus>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            layout,
            event_bus,
        }
    }

    /// Registry without snapshots or events
    pub fn in_memory() -> Self {
        Self::new(None, None)
    }

    fn emit(&self, event: FpxEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }

    async fn persist(&self, job: &Job) {
        let Some(dir) = &job.persist_dir else {
            return;
        };
        if let Err(e) = job_persistence::write_status(dir, job).await {
            warn!(job_id = %job.job_id, error = %e, "Failed to persist job status");
        }
    }

    /// Apply `f` under the write lock and return the new snapshot
    async fn mutate<F>(&self, job_id: Uuid, f: F) -> PipelineResult<Job>
    where
        F: FnOnce(&mut Job) -> PipelineResult<()>,
    {
        let snapshot = {
            let mut jobs = self.jobs.write().await;
            let entry = jobs
                .get_mut(&job_id)
                .ok_or(AnalysisError::JobNotFound(job_id))?;
            f(&mut entry.job)?;
            entry.job.clone()
        };
        self.persist(&snapshot).await;
        Ok(snapshot)
    }

    /// Register a queued job and return its snapshot
    pub async fn create(&self, project_id: i64, params: serde_json::Value) -> Job {
        let mut job = Job::new(project_id, params, None);
        job.persist_dir = self
            .layout
            .as_ref()
            .map(|layout| layout.job_dir(project_id, &job.job_id));

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(
                job.job_id,
                JobEntry {
                    job: job.clone(),
                    result: None,
                },
            );
        }

        info!(job_id = %job.job_id, project_id, "Job queued");
        self.persist(&job).await;
        self.emit(FpxEvent::JobQueued {
            job_id: job.job_id,
            project_id,
            timestamp: job.created_at,
        });
        job
    }

    pub async fn start(&self, job_id: Uuid, message: &str) -> PipelineResult<Job> {
        let job = self.mutate(job_id, |job| job.start(message)).await?;
        self.emit_progress(&job);
        Ok(job)
    }

    /// Report progress; values below the current one are ignored
    pub async fn update(&self, job_id: Uuid, progress: u8, message: &str) -> PipelineResult<Job> {
        let job = self
            .mutate(job_id, |job| job.update_progress(progress, message))
            .await?;
        debug!(job_id = %job_id, progress = job.progress, message, "Job progress");
        self.emit_progress(&job);
        Ok(job)
    }

    fn emit_progress(&self, job: &Job) {
        self.emit(FpxEvent::JobProgress {
            job_id: job.job_id,
            project_id: job.project_id,
            progress: job.progress,
            message: job.message.clone(),
            timestamp: job.updated_at,
        });
    }

    /// Store the result and mark the job succeeded
    ///
    /// The result file is best-effort; the in-memory copy is authoritative.
    pub async fn complete(&self, job_id: Uuid, result: ResultResponse) -> PipelineResult<Job> {
        let current = self.get(job_id).await?;
        if current.status != JobStatus::Running {
            return Err(AnalysisError::InvalidTransition {
                job_id,
                from: current.status.to_string(),
                to: JobStatus::Succeeded.to_string(),
            });
        }

        let location = match &current.persist_dir {
            Some(dir) => match job_persistence::write_result(dir, &result).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Failed to persist job result");
                    None
                }
            },
            None => None,
        };

        let result = Arc::new(result);
        let snapshot = {
            let mut jobs = self.jobs.write().await;
            let entry = jobs
                .get_mut(&job_id)
                .ok_or(AnalysisError::JobNotFound(job_id))?;
            entry.job.complete(location)?;
            entry.result = Some(result);
            entry.job.clone()
        };
        self.persist(&snapshot).await;

        info!(job_id = %job_id, "Job succeeded");
        self.emit(FpxEvent::JobSucceeded {
            job_id,
            project_id: snapshot.project_id,
            timestamp: snapshot.updated_at,
        });
        Ok(snapshot)
    }

    /// Mark the job failed, keeping its last progress
    pub async fn fail(&self, job_id: Uuid, error: &str) -> PipelineResult<Job> {
        let job = self.mutate(job_id, |job| job.fail(error)).await?;
        warn!(job_id = %job_id, progress = job.progress, error, "Job failed");
        self.emit(FpxEvent::JobFailed {
            job_id,
            project_id: job.project_id,
            progress: job.progress,
            error_message: error.to_string(),
            timestamp: job.updated_at,
        });
        Ok(job)
    }

    pub async fn get(&self, job_id: Uuid) -> PipelineResult<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id)
            .map(|entry| entry.job.clone())
            .ok_or(AnalysisError::JobNotFound(job_id))
    }

    /// Jobs of a project, newest first
    pub async fn list(&self, project_id: i64, skip: usize, limit: usize) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<&Job> = jobs
            .values()
            .map(|entry| &entry.job)
            .filter(|job| job.project_id == project_id)
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
            .into_iter()
            .skip(skip)
            .take(limit.min(MAX_LIST_LIMIT))
            .cloned()
            .collect()
    }

    /// Result of a succeeded job
    ///
    /// Fails with `ResultNotReady` for any other status.
    pub async fn result(&self, job_id: Uuid) -> PipelineResult<Arc<ResultResponse>> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&job_id).ok_or(AnalysisError::JobNotFound(job_id))?;
        match (&entry.job.status, &entry.result) {
            (JobStatus::Succeeded, Some(result)) => Ok(Arc::clone(result)),
            (status, _) => Err(AnalysisError::ResultNotReady {
                job_id,
                status: status.to_string(),
            }),
        }
    }

    /// Drop terminal jobs created more than `max_age` ago
    pub async fn purge_expired(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| !(entry.job.is_terminal() && entry.job.created_at < cutoff));
        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, "Purged expired jobs");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    #[cfg(test)]
    async fn backdate(&self, job_id: Uuid, age: Duration) {
        let mut jobs = self.jobs.write().await;
        if let Some(entry) = jobs.get_mut(&job_id) {
            entry.job.created_at = entry.job.created_at - age;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultMeta;

    fn result(job_id: Uuid) -> ResultResponse {
        ResultResponse {
            job_id,
            meta: ResultMeta {
                project_id: 1,
                sampling_rate_hz: 20.0,
                mode: "single".to_string(),
                params: serde_json::json!({}),
                tags_used: Vec::new(),
                dataset_count: 1,
                analysis: serde_json::Map::new(),
            },
            matrices: Vec::new(),
            curves: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_and_result() {
        let registry = JobRegistry::in_memory();
        let job = registry.create(1, serde_json::json!({})).await;
        assert_eq!(job.status, JobStatus::Queued);

        registry.start(job.job_id, "running").await.unwrap();
        registry.update(job.job_id, 40, "halfway").await.unwrap();
        let done = registry.complete(job.job_id, result(job.job_id)).await.unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.progress, 100);

        let fetched = registry.result(job.job_id).await.unwrap();
        assert_eq!(fetched.job_id, job.job_id);
    }

    #[tokio::test]
    async fn test_failure_keeps_progress_and_result_not_ready() {
        let registry = JobRegistry::in_memory();
        let job = registry.create(1, serde_json::json!({})).await;
        registry.start(job.job_id, "running").await.unwrap();
        registry.update(job.job_id, 50, "warping").await.unwrap();
        registry.fail(job.job_id, "segment out of range").await.unwrap();

        let failed = registry.get(job.job_id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.progress, 50);
        assert_eq!(failed.error.as_deref(), Some("segment out of range"));

        let err = registry.result(job.job_id).await.unwrap_err();
        assert!(matches!(err, AnalysisError::ResultNotReady { .. }));
    }

    #[tokio::test]
    async fn test_complete_requires_running() {
        let registry = JobRegistry::in_memory();
        let job = registry.create(1, serde_json::json!({})).await;
        let err = registry.complete(job.job_id, result(job.job_id)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let registry = JobRegistry::in_memory();
        let id = Uuid::new_v4();
        assert!(matches!(
            registry.get(id).await,
            Err(AnalysisError::JobNotFound(_))
        ));
        assert!(matches!(
            registry.update(id, 10, "x").await,
            Err(AnalysisError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paged() {
        let registry = JobRegistry::in_memory();
        let mut ids = Vec::new();
        for i in 0..3 {
            let job = registry.create(1, serde_json::json!({ "n": i })).await;
            registry.backdate(job.job_id, Duration::minutes(10 - i)).await;
            ids.push(job.job_id);
        }
        registry.create(2, serde_json::json!({})).await;

        let listed: Vec<Uuid> = registry
            .list(1, 0, DEFAULT_LIST_LIMIT)
            .await
            .iter()
            .map(|j| j.job_id)
            .collect();
        assert_eq!(listed, vec![ids[2], ids[1], ids[0]]);

        let page = registry.list(1, 1, 1).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].job_id, ids[1]);
    }

    #[tokio::test]
    async fn test_purge_only_old_terminal_jobs() {
        let registry = JobRegistry::in_memory();
        let old_failed = registry.create(1, serde_json::json!({})).await;
        registry.fail(old_failed.job_id, "x").await.unwrap();
        registry.backdate(old_failed.job_id, Duration::hours(48)).await;

        let old_running = registry.create(1, serde_json::json!({})).await;
        registry.start(old_running.job_id, "running").await.unwrap();
        registry.backdate(old_running.job_id, Duration::hours(48)).await;

        let fresh_failed = registry.create(1, serde_json::json!({})).await;
        registry.fail(fresh_failed.job_id, "y").await.unwrap();

        assert_eq!(registry.purge_expired(Duration::hours(24)).await, 1);
        assert!(registry.get(old_failed.job_id).await.is_err());
        assert!(registry.get(old_running.job_id).await.is_ok());
        assert!(registry.get(fresh_failed.job_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshots_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(dir.path());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let registry = JobRegistry::new(Some(layout.clone()), Some(bus));

        let job = registry.create(4, serde_json::json!({})).await;
        registry.start(job.job_id, "running").await.unwrap();
        registry.complete(job.job_id, result(job.job_id)).await.unwrap();

        let job_dir = layout.job_dir(4, &job.job_id);
        let status = job_persistence::read_status(&job_dir).await.unwrap();
        assert_eq!(status.status, JobStatus::Succeeded);
        assert!(job_dir.join(job_persistence::RESULT_FILE).exists());

        assert_eq!(rx.recv().await.unwrap().event_type(), "JobQueued");
        assert_eq!(rx.recv().await.unwrap().event_type(), "JobProgress");
        assert_eq!(rx.recv().await.unwrap().event_type(), "JobSucceeded");
    }

    #[tokio::test]
    async fn test_unwritable_persistence_does_not_affect_state() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where the uploads directory should be
        std::fs::write(dir.path().join("uploads"), b"not a directory").unwrap();
        let registry = JobRegistry::new(Some(RootLayout::new(dir.path())), None);

        let job = registry.create(1, serde_json::json!({})).await;
        registry.start(job.job_id, "running").await.unwrap();
        registry.complete(job.job_id, result(job.job_id)).await.unwrap();

        let done = registry.get(job.job_id).await.unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert!(done.result_location.is_none());
        assert!(registry.result(job.job_id).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_see_torn_progress() {
        let registry = Arc::new(JobRegistry::in_memory());
        let job = registry.create(1, serde_json::json!({})).await;
        registry.start(job.job_id, "running").await.unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for progress in 1..=99u8 {
                    registry
                        .update(job.job_id, progress, &format!("stage {}", progress))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let mut last = 0u8;
                    for _ in 0..500 {
                        let snapshot = registry.get(job.job_id).await.unwrap();
                        let expected = if snapshot.progress == 0 {
                            "running".to_string()
                        } else {
                            format!("stage {}", snapshot.progress)
                        };
                        assert_eq!(snapshot.message, expected);
                        assert_eq!(snapshot.status, JobStatus::Running);
                        assert!(snapshot.progress >= last);
                        last = snapshot.progress;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(registry.get(job.job_id).await.unwrap().progress, 99);
    }
}
