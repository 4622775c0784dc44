//! Structured per-job logging.

use std::time::Instant;

use tracing::{error, info, warn, Span};
use vaud_models::JobId;

/// Emits conversion lifecycle events tagged with the job and the consumer
/// handling it. Elapsed time is measured from construction.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    consumer: String,
    started: Instant,
}

impl JobLogger {
    pub fn new(job_id: &JobId, consumer: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            consumer: consumer.to_string(),
            started: Instant::now(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    pub fn log_start(&self, input: &str) {
        info!(job_id = %self.job_id, consumer = %self.consumer, input, "Conversion started");
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, consumer = %self.consumer, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            consumer = %self.consumer,
            elapsed_ms = self.elapsed_ms(),
            "Conversion failed: {}", message
        );
    }

    pub fn log_completion(&self, output: &str, size: u64) {
        info!(
            job_id = %self.job_id,
            consumer = %self.consumer,
            output,
            size,
            elapsed_ms = self.elapsed_ms(),
            "Conversion completed"
        );
    }

    /// Span wrapping everything done for one delivery of the job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, consumer = %self.consumer)
    }
}
