//! Queries for `conversion_jobs` and `request_logs`.

use sqlx::PgPool;

use vaud_models::{AuditLogEntry, Job};

use crate::models::{JobRow, RequestLog};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const JOB_COLUMNS: &str = "\
    job_id, user_id, original_filename, file_path, status, \
    created_at, completed_at, audio_file_path";

const LOG_COLUMNS: &str = "id, job_id, action, details, timestamp";

// ---------------------------------------------------------------------------
// JobRowRepo
// ---------------------------------------------------------------------------

/// Mirrored job rows.
pub struct JobRowRepo;

impl JobRowRepo {
    /// Insert the row or overwrite its mutable columns.
    pub async fn upsert(pool: &PgPool, job: &Job) -> Result<JobRow, sqlx::Error> {
        let row = JobRow::from(job);
        let query = format!(
            "INSERT INTO conversion_jobs ({JOB_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (job_id) DO UPDATE SET \
                status = EXCLUDED.status, \
                completed_at = EXCLUDED.completed_at, \
                audio_file_path = EXCLUDED.audio_file_path \
             RETURNING {JOB_COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(&row.job_id)
            .bind(&row.user_id)
            .bind(&row.original_filename)
            .bind(&row.file_path)
            .bind(&row.status)
            .bind(row.created_at)
            .bind(row.completed_at)
            .bind(&row.audio_file_path)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, job_id: &str) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {JOB_COLUMNS} FROM conversion_jobs WHERE job_id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// RequestLogRepo
// ---------------------------------------------------------------------------

/// Append-only request log.
pub struct RequestLogRepo;

impl RequestLogRepo {
    pub async fn append(pool: &PgPool, entry: &AuditLogEntry) -> Result<RequestLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO request_logs (job_id, action, details, timestamp) \
             VALUES ($1, $2, $3, $4) RETURNING {LOG_COLUMNS}"
        );
        sqlx::query_as::<_, RequestLog>(&query)
            .bind(entry.job_id.as_str())
            .bind(entry.action.as_str())
            .bind(&entry.details)
            .bind(entry.timestamp)
            .fetch_one(pool)
            .await
    }

    /// All entries for a job, oldest first.
    pub async fn list_for_job(pool: &PgPool, job_id: &str) -> Result<Vec<RequestLog>, sqlx::Error> {
        let query = format!(
            "SELECT {LOG_COLUMNS} FROM request_logs WHERE job_id = $1 ORDER BY timestamp, id"
        );
        sqlx::query_as::<_, RequestLog>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
