//! Job lookup and artifact resolution.

use thiserror::Error;
use tokio::fs::File;

use vaud_models::{AudioCodec, Job, JobId, JobStatus};
use vaud_storage::{AssetStorage, StorageError};
use vaud_store::{JobStore, StoreError};

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("{0}")]
    NotFound(&'static str),

    #[error("Job is not completed. Current status: {0}")]
    InvalidState(JobStatus),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An opened artifact ready to stream.
#[derive(Debug)]
pub struct Artifact {
    pub file: File,
    pub size: u64,
    pub content_type: &'static str,
    pub file_name: String,
}

/// Read side of the pipeline.
#[derive(Clone)]
pub struct ResultRetriever {
    store: JobStore,
    storage: AssetStorage,
    codec: AudioCodec,
}

impl ResultRetriever {
    pub fn new(store: JobStore, storage: AssetStorage, codec: AudioCodec) -> Self {
        Self {
            store,
            storage,
            codec,
        }
    }

    /// Full job record.
    pub async fn info(&self, job_id: &JobId) -> Result<Job, RetrieveError> {
        self.store
            .get(job_id)
            .await?
            .ok_or(RetrieveError::NotFound("Job not found"))
    }

    /// Open a completed job's artifact.
    ///
    /// The stored reference is tried first, then the default output location
    /// for the job. Content type and download name follow the file found,
    /// falling back to the configured codec for unknown extensions.
    pub async fn resolve(&self, job_id: &JobId) -> Result<Artifact, RetrieveError> {
        let job = self.info(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(RetrieveError::InvalidState(job.status));
        }

        let asset = self
            .storage
            .resolve_artifact(job_id, job.output_ref.as_deref(), self.codec)
            .await
            .ok_or(RetrieveError::NotFound("Audio file not found"))?;

        let file = self.storage.open(&asset.path).await.map_err(|e| match e {
            StorageError::NotFound(_) => RetrieveError::NotFound("Audio file not found"),
            other => other.into(),
        })?;

        let (extension, content_type) = asset
            .path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| {
                AudioCodec::content_type_for_extension(ext).map(|ct| (ext.to_ascii_lowercase(), ct))
            })
            .unwrap_or_else(|| (self.codec.extension().to_string(), self.codec.content_type()));

        Ok(Artifact {
            file,
            size: asset.size,
            content_type,
            file_name: format!("{}.{}", job_id, extension),
        })
    }
}
