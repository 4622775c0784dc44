//! Single-job processing.

use std::path::Path;
use std::sync::Arc;

use tracing::Instrument;

use vaud_media::ConversionEngine;
use vaud_models::{ConversionSettings, JobStatus, TaskDescriptor};
use vaud_storage::AssetStorage;
use vaud_store::{JobStore, StoreError, Transition};

use crate::error::WorkerResult;
use crate::logging::JobLogger;

/// What happened to a task. Every variant is safe to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { output_ref: String, output_size: u64 },
    Failed { reason: String },
    /// The job was already terminal, typically a redelivery after completion.
    Skipped { status: JobStatus },
    /// No job record exists for the task.
    Discarded,
}

/// Runs one task through the engine and records the result.
#[derive(Clone)]
pub struct JobProcessor {
    store: JobStore,
    engine: Arc<dyn ConversionEngine>,
    storage: AssetStorage,
    settings: ConversionSettings,
}

impl JobProcessor {
    pub fn new(
        store: JobStore,
        engine: Arc<dyn ConversionEngine>,
        storage: AssetStorage,
        settings: ConversionSettings,
    ) -> Self {
        Self {
            store,
            engine,
            storage,
            settings,
        }
    }

    /// Process a task.
    ///
    /// Engine and input problems are recorded as a failed job and returned as
    /// [`JobOutcome::Failed`]. Only store errors come back as `Err`, in which
    /// case the message must stay unacknowledged.
    pub async fn process(&self, task: &TaskDescriptor, consumer: &str) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(&task.job_id, consumer);
        let span = logger.create_span();
        self.process_inner(task, consumer, &logger)
            .instrument(span)
            .await
    }

    async fn process_inner(
        &self,
        task: &TaskDescriptor,
        consumer: &str,
        logger: &JobLogger,
    ) -> WorkerResult<JobOutcome> {
        match self.store.mark_processing(&task.job_id, consumer).await {
            Ok(Transition::Applied(_)) => {}
            Ok(Transition::Skipped(job)) => {
                logger.log_warning(&format!("already {}, skipping", job.status));
                return Ok(JobOutcome::Skipped { status: job.status });
            }
            Err(StoreError::JobNotFound(_)) => {
                tracing::error!("No job record for {}, discarding task", task.job_id);
                return Ok(JobOutcome::Discarded);
            }
            Err(e) => return Err(e.into()),
        }

        logger.log_start(&task.input_ref);

        let input = Path::new(&task.input_ref);
        let output = self.storage.output_path(&task.job_id, self.settings.codec);

        let result = self.engine.convert(input, &output, &self.settings).await;

        match result {
            Ok(converted) => {
                let output_ref = converted.output_path.display().to_string();
                let transition = self
                    .store
                    .mark_completed(&task.job_id, &output_ref, converted.output_size)
                    .await?;
                if let Transition::Skipped(job) = transition {
                    logger.log_warning(&format!("finished but job is already {}", job.status));
                    return Ok(JobOutcome::Skipped { status: job.status });
                }
                logger.log_completion(&output_ref, converted.output_size);
                Ok(JobOutcome::Completed {
                    output_ref,
                    output_size: converted.output_size,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                logger.log_error(&reason);
                if let Transition::Skipped(job) =
                    self.store.mark_failed(&task.job_id, &reason).await?
                {
                    return Ok(JobOutcome::Skipped { status: job.status });
                }
                Ok(JobOutcome::Failed { reason })
            }
        }
    }
}
