//! Job lifecycle persistence.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use vaud_models::{AuditAction, AuditLogEntry, Job, JobId, TransitionError};

use crate::error::{StoreError, StoreResult};
use crate::traits::{LogStore, StateStore};

/// Counter of log store writes that were dropped.
pub const LOG_STORE_FAILURES: &str = "vaud_log_store_failures_total";

/// Outcome of a status change request.
#[derive(Debug, Clone)]
pub enum Transition {
    /// The change was written; holds the new record.
    Applied(Job),
    /// The current status does not allow the change; nothing was written.
    Skipped(Job),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

/// One page of jobs plus the total count.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: u64,
}

/// Writes job state to the state store and mirrors it to the log store.
#[derive(Clone)]
pub struct JobStore {
    state: Arc<dyn StateStore>,
    log: Arc<dyn LogStore>,
}

impl JobStore {
    pub fn new(state: Arc<dyn StateStore>, log: Arc<dyn LogStore>) -> Self {
        Self { state, log }
    }

    /// Persist a newly submitted job and record the upload.
    pub async fn create(&self, job: &Job) -> StoreResult<()> {
        self.state.upsert(job).await?;
        let details = json!({
            "filename": job.original_filename,
            "file_size": job.input_size,
            "content_type": job.content_type,
        });
        self.mirror(job, AuditAction::Upload, details).await;
        Ok(())
    }

    pub async fn get(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        self.state.get(job_id).await
    }

    /// Newest jobs first, with the total count.
    pub async fn list(&self, limit: u32, skip: u32) -> StoreResult<JobPage> {
        let jobs = self.state.list_recent(limit, skip).await?;
        let total = self.state.count().await?;
        Ok(JobPage { jobs, total })
    }

    /// Move a job to `processing`.
    ///
    /// Re-entering `processing` is allowed so a redelivered task can restart
    /// an interrupted conversion.
    pub async fn mark_processing(&self, job_id: &JobId, consumer: &str) -> StoreResult<Transition> {
        self.transition(job_id, AuditAction::ProcessingStarted, |job| {
            job.start_processing()?;
            Ok(json!({ "file_path": job.input_ref, "consumer": consumer }))
        })
        .await
    }

    pub async fn mark_completed(
        &self,
        job_id: &JobId,
        output_ref: &str,
        output_size: u64,
    ) -> StoreResult<Transition> {
        self.transition(job_id, AuditAction::ProcessingCompleted, |job| {
            job.complete(output_ref, output_size)?;
            Ok(json!({ "output_file": output_ref, "file_size": output_size }))
        })
        .await
    }

    pub async fn mark_failed(&self, job_id: &JobId, reason: &str) -> StoreResult<Transition> {
        self.transition(job_id, AuditAction::ProcessingFailed, |job| {
            job.fail(reason)?;
            Ok(json!({ "error": job.error }))
        })
        .await
    }

    /// Read, apply, write state, then mirror.
    ///
    /// This is read-check-write against a last-write-wins store; concurrent
    /// writers for one job are not expected because a job is owned by a
    /// single consumer at a time.
    async fn transition<F>(
        &self,
        job_id: &JobId,
        action: AuditAction,
        apply: F,
    ) -> StoreResult<Transition>
    where
        F: FnOnce(&mut Job) -> Result<serde_json::Value, TransitionError>,
    {
        let mut job = self
            .state
            .get(job_id)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(job_id.clone()))?;

        let details = match apply(&mut job) {
            Ok(details) => details,
            Err(e) => {
                debug!("Skipping {} for job {}: {}", action, job_id, e);
                return Ok(Transition::Skipped(job));
            }
        };

        self.state.upsert(&job).await?;
        self.mirror(&job, action, details).await;
        Ok(Transition::Applied(job))
    }

    async fn mirror(&self, job: &Job, action: AuditAction, details: serde_json::Value) {
        if let Err(e) = self.log.mirror_job(job).await {
            warn!(job_id = %job.job_id, "Failed to mirror job row: {}", e);
            counter!(LOG_STORE_FAILURES, "op" => "mirror").increment(1);
        }

        let entry = AuditLogEntry::new(job.job_id.clone(), action, details);
        if let Err(e) = self.log.append(&entry).await {
            warn!(job_id = %job.job_id, action = %action, "Failed to append audit entry: {}", e);
            counter!(LOG_STORE_FAILURES, "op" => "append").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryLogStore, MemoryStateStore};
    use vaud_models::JobStatus;

    struct Fixture {
        state: Arc<MemoryStateStore>,
        log: Arc<MemoryLogStore>,
        store: JobStore,
    }

    fn fixture() -> Fixture {
        let state = Arc::new(MemoryStateStore::new());
        let log = Arc::new(MemoryLogStore::new());
        let store = JobStore::new(state.clone(), log.clone());
        Fixture { state, log, store }
    }

    fn queued_job() -> Job {
        Job::new_queued(JobId::new(), "/u/in.mp4", "in.mp4", None)
            .with_content_type("video/mp4")
            .with_input_size(100)
    }

    #[tokio::test]
    async fn test_create_writes_both_stores() {
        let f = fixture();
        let job = queued_job();
        f.store.create(&job).await.unwrap();

        assert_eq!(f.state.snapshot(&job.job_id).unwrap().status, JobStatus::Queued);
        assert_eq!(f.log.row(&job.job_id).unwrap().status, JobStatus::Queued);
        let entries = f.log.entries();
        assert_eq!(entries[0].action, AuditAction::Upload);
        assert_eq!(entries[0].details["filename"], "in.mp4");
        assert_eq!(entries[0].details["file_size"], 100);
        assert_eq!(entries[0].details["content_type"], "video/mp4");
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let f = fixture();
        let job = queued_job();
        f.store.create(&job).await.unwrap();

        assert!(f.store.mark_processing(&job.job_id, "w1").await.unwrap().is_applied());
        assert!(f
            .store
            .mark_completed(&job.job_id, "/o/out.mp3", 42)
            .await
            .unwrap()
            .is_applied());

        let stored = f.state.snapshot(&job.job_id).unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.output_size, Some(42));
        assert_eq!(
            f.log.actions_for(&job.job_id),
            [
                AuditAction::Upload,
                AuditAction::ProcessingStarted,
                AuditAction::ProcessingCompleted
            ]
        );
        assert_eq!(
            f.log.row(&job.job_id).unwrap().output_ref.as_deref(),
            Some("/o/out.mp3")
        );
    }

    #[tokio::test]
    async fn test_terminal_job_is_skipped() {
        let f = fixture();
        let job = queued_job();
        f.store.create(&job).await.unwrap();
        f.store.mark_processing(&job.job_id, "w1").await.unwrap();
        f.store.mark_failed(&job.job_id, "boom").await.unwrap();

        let outcome = f.store.mark_processing(&job.job_id, "w2").await.unwrap();
        assert!(matches!(outcome, Transition::Skipped(ref j) if j.status == JobStatus::Failed));
        let outcome = f.store.mark_completed(&job.job_id, "/o.mp3", 1).await.unwrap();
        assert!(!outcome.is_applied());

        let stored = f.state.snapshot(&job.job_id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("boom"));
        assert_eq!(f.log.actions_for(&job.job_id).len(), 3);
    }

    #[tokio::test]
    async fn test_log_store_failure_does_not_block() {
        let f = fixture();
        let job = queued_job();
        f.log.set_failing(true);

        f.store.create(&job).await.unwrap();
        f.store.mark_processing(&job.job_id, "w1").await.unwrap();

        assert_eq!(
            f.state.snapshot(&job.job_id).unwrap().status,
            JobStatus::Processing
        );
        assert!(f.log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_state_store_failure_propagates() {
        let f = fixture();
        let job = queued_job();
        f.store.create(&job).await.unwrap();
        f.state.set_fail_writes(true);

        let err = f.store.mark_processing(&job.job_id, "w1").await.unwrap_err();
        assert!(matches!(err, StoreError::State(_)));
        assert_eq!(f.log.actions_for(&job.job_id), [AuditAction::Upload]);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let f = fixture();
        let err = f
            .store
            .mark_processing(&JobId::from_string("ghost"), "w1")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let f = fixture();
        let mut ids = Vec::new();
        for i in 0..5 {
            let mut job = queued_job();
            job.created_at += chrono::Duration::seconds(i);
            ids.push(job.job_id.clone());
            f.store.create(&job).await.unwrap();
        }

        let page = f.store.list(2, 1).await.unwrap();
        assert_eq!(page.total, 5);
        let got: Vec<JobId> = page.jobs.into_iter().map(|j| j.job_id).collect();
        assert_eq!(got, [ids[3].clone(), ids[2].clone()]);
    }
}
