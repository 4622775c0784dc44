//! Ledger queries against a real Postgres.
//!
//! Run with `DATABASE_URL` pointing at a scratch server and `--ignored`.

use serde_json::json;
use sqlx::PgPool;

use vaud_ledger::{JobRowRepo, RequestLogRepo};
use vaud_models::{AuditAction, AuditLogEntry, Job, JobId};

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn test_job_row_upsert_overwrites_status(pool: PgPool) {
    let mut job = Job::new_queued(JobId::new(), "/u/a.mp4", "a.mp4", None);
    let row = JobRowRepo::upsert(&pool, &job).await.unwrap();
    assert_eq!(row.status, "queued");
    assert_eq!(row.user_id, "anonymous");

    job.start_processing().unwrap();
    job.complete("/o/a.mp3", 3).unwrap();
    let row = JobRowRepo::upsert(&pool, &job).await.unwrap();
    assert_eq!(row.status, "completed");
    assert_eq!(row.audio_file_path.as_deref(), Some("/o/a.mp3"));
    assert!(row.completed_at.is_some());

    let found = JobRowRepo::find_by_id(&pool, job.job_id.as_str()).await.unwrap().unwrap();
    assert_eq!(found.status, "completed");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn test_request_log_is_append_only(pool: PgPool) {
    let job_id = JobId::new();
    for action in [AuditAction::Upload, AuditAction::ProcessingStarted, AuditAction::ProcessingStarted] {
        RequestLogRepo::append(&pool, &AuditLogEntry::new(job_id.clone(), action, json!({"n": 1})))
            .await
            .unwrap();
    }

    let logs = RequestLogRepo::list_for_job(&pool, job_id.as_str()).await.unwrap();
    let actions: Vec<&str> = logs.iter().map(|l| l.action.as_str()).collect();
    assert_eq!(actions, ["upload", "processing_started", "processing_started"]);
    assert_eq!(logs[0].details["n"], 1);
}
