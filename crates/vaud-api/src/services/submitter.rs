//! Job submission.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use vaud_models::{Job, JobId, TaskDescriptor};
use vaud_queue::{QueueError, TaskPublisher};
use vaud_storage::{AssetStorage, StorageError};
use vaud_store::{JobStore, StoreError};

use crate::metrics;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid file type: {0}. Please upload a video file.")]
    InvalidContentType(String),

    #[error("Failed to save upload: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to record job: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to queue job: {0}")]
    Publish(QueueError),
}

/// An uploaded asset as received from the client.
#[derive(Debug, Clone)]
pub struct Submission {
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    pub owner: Option<String>,
}

/// Stores an asset, records the job and enqueues it.
#[derive(Clone)]
pub struct JobSubmitter {
    store: JobStore,
    publisher: Arc<dyn TaskPublisher>,
    storage: AssetStorage,
}

impl JobSubmitter {
    pub fn new(store: JobStore, publisher: Arc<dyn TaskPublisher>, storage: AssetStorage) -> Self {
        Self {
            store,
            publisher,
            storage,
        }
    }

    /// Accept a submission.
    ///
    /// Store then publish, with no atomic coupling between the two. A publish
    /// failure marks the job failed; a crash between the steps leaves it
    /// queued with no message.
    pub async fn submit(&self, submission: Submission) -> Result<Job, SubmitError> {
        let content_type = submission.content_type.unwrap_or_default();
        if !content_type.starts_with("video/") {
            let shown = if content_type.is_empty() { "unknown" } else { &content_type };
            return Err(SubmitError::InvalidContentType(shown.to_string()));
        }

        let job_id = JobId::new();
        let asset = self
            .storage
            .save_upload(&job_id, &submission.original_name, &submission.data)
            .await?;

        let job = Job::new_queued(
            job_id.clone(),
            asset.path.display().to_string(),
            submission.original_name,
            submission.owner.filter(|o| !o.is_empty()),
        )
        .with_content_type(content_type)
        .with_input_size(asset.size);

        if let Err(e) = self.store.create(&job).await {
            error!("Failed to record job {}: {}", job_id, e);
            self.discard_asset(&asset.path).await;
            metrics::record_submit_failure("store");
            return Err(e.into());
        }

        if let Err(e) = self.publisher.publish(&TaskDescriptor::from(&job)).await {
            let reason = format!("Failed to queue job: {}", e);
            error!("{} ({})", reason, job_id);
            if let Err(mark) = self.store.mark_failed(&job_id, &reason).await {
                error!("Failed to mark job {} failed: {}", job_id, mark);
            }
            self.discard_asset(&asset.path).await;
            metrics::record_submit_failure("publish");
            return Err(SubmitError::Publish(e));
        }

        info!("Job {} queued ({} bytes)", job_id, asset.size);
        metrics::record_job_submitted();
        Ok(job)
    }

    async fn discard_asset(&self, path: &Path) {
        if let Err(e) = self.storage.remove(path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
