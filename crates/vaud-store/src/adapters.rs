//! Production store implementations.

use async_trait::async_trait;

use vaud_firestore::JobRepository;
use vaud_ledger::{DbPool, JobRowRepo, LedgerError, RequestLogRepo};
use vaud_models::{AuditLogEntry, Job, JobId};

use crate::error::StoreResult;
use crate::traits::{LogStore, StateStore};

#[async_trait]
impl StateStore for JobRepository {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        Ok(JobRepository::get(self, job_id).await?)
    }

    async fn upsert(&self, job: &Job) -> StoreResult<()> {
        Ok(JobRepository::upsert(self, job).await?)
    }

    async fn list_recent(&self, limit: u32, skip: u32) -> StoreResult<Vec<Job>> {
        Ok(JobRepository::list_recent(self, limit, skip).await?)
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(JobRepository::count(self).await?)
    }
}

/// Postgres-backed [`LogStore`].
#[derive(Clone)]
pub struct PgLogStore {
    pool: DbPool,
}

impl PgLogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn mirror_job(&self, job: &Job) -> StoreResult<()> {
        JobRowRepo::upsert(&self.pool, job)
            .await
            .map_err(LedgerError::from)?;
        Ok(())
    }

    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        RequestLogRepo::append(&self.pool, entry)
            .await
            .map_err(LedgerError::from)?;
        Ok(())
    }
}
