//! Store seams.

use async_trait::async_trait;

use vaud_models::{AuditLogEntry, Job, JobId};

use crate::error::StoreResult;

/// Authoritative current-state store, keyed by job id.
///
/// `upsert` is last-write-wins on the whole record.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<Job>>;

    async fn upsert(&self, job: &Job) -> StoreResult<()>;

    /// Jobs ordered by `created_at`, newest first.
    async fn list_recent(&self, limit: u32, skip: u32) -> StoreResult<Vec<Job>>;

    async fn count(&self) -> StoreResult<u64>;
}

/// Diagnostic sink: a mirrored row per job plus the audit trail.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn mirror_job(&self, job: &Job) -> StoreResult<()>;

    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()>;
}
