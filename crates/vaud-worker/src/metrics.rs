//! Worker metrics.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};
use crate::processor::JobOutcome;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "vaud_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vaud_jobs_failed_total";
    pub const JOBS_SKIPPED_TOTAL: &str = "vaud_jobs_skipped_total";
    pub const JOB_DURATION_SECONDS: &str = "vaud_job_duration_seconds";
    pub const MESSAGES_DISCARDED_TOTAL: &str = "vaud_messages_discarded_total";
    pub const WORKER_RECONNECTS_TOTAL: &str = "vaud_worker_reconnects_total";
}

/// Serve `/metrics` on `0.0.0.0:port`.
pub fn install_exporter(port: u16) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()
        .map_err(|e| WorkerError::config(format!("metrics exporter: {}", e)))
}

pub fn record_outcome(outcome: &JobOutcome, elapsed: Duration) {
    match outcome {
        JobOutcome::Completed { .. } => {
            counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
            histogram!(names::JOB_DURATION_SECONDS, "outcome" => "completed")
                .record(elapsed.as_secs_f64());
        }
        JobOutcome::Failed { .. } => {
            counter!(names::JOBS_FAILED_TOTAL).increment(1);
            histogram!(names::JOB_DURATION_SECONDS, "outcome" => "failed")
                .record(elapsed.as_secs_f64());
        }
        JobOutcome::Skipped { .. } => counter!(names::JOBS_SKIPPED_TOTAL).increment(1),
        JobOutcome::Discarded => {
            counter!(names::MESSAGES_DISCARDED_TOTAL, "reason" => "missing_job").increment(1)
        }
    }
}

pub fn record_malformed() {
    counter!(names::MESSAGES_DISCARDED_TOTAL, "reason" => "malformed").increment(1);
}

pub fn record_reconnect() {
    counter!(names::WORKER_RECONNECTS_TOTAL).increment(1);
}
