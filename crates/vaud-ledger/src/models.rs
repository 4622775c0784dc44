//! Row types for the ledger tables.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use vaud_models::Job;

/// Owner recorded when a job has none.
pub const ANONYMOUS_USER: &str = "anonymous";

/// A row from `conversion_jobs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRow {
    pub job_id: String,
    pub user_id: String,
    pub original_filename: String,
    pub file_path: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub audio_file_path: Option<String>,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            user_id: job.owner.clone().unwrap_or_else(|| ANONYMOUS_USER.to_string()),
            original_filename: job.original_filename.clone(),
            file_path: job.input_ref.clone(),
            status: job.status.as_str().to_string(),
            created_at: job.created_at,
            completed_at: job.completed_at,
            audio_file_path: job.output_ref.clone(),
        }
    }
}

/// A row from `request_logs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RequestLog {
    pub id: i64,
    pub job_id: String,
    pub action: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
