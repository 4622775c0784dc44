//! In-memory stores for tests and single-process runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use vaud_models::{AuditAction, AuditLogEntry, Job, JobId};

use crate::error::{StoreError, StoreResult};
use crate::traits::{LogStore, StateStore};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`StateStore`] over a `HashMap`.
#[derive(Default)]
pub struct MemoryStateStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    fail_writes: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `upsert` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self, job_id: &JobId) -> Option<Job> {
        lock(&self.jobs).get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.snapshot(job_id))
    }

    async fn upsert(&self, job: &Job) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::state("state store unavailable"));
        }
        lock(&self.jobs).insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: u32, skip: u32) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = lock(&self.jobs).values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.len() as u64)
    }
}

/// [`LogStore`] that records everything it is given.
#[derive(Default)]
pub struct MemoryLogStore {
    rows: Mutex<HashMap<JobId, Job>>,
    entries: Mutex<Vec<AuditLogEntry>>,
    failing: AtomicBool,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Mirrored row for a job.
    pub fn row(&self, job_id: &JobId) -> Option<Job> {
        lock(&self.rows).get(job_id).cloned()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        lock(&self.entries).clone()
    }

    /// Audit actions recorded for a job, in order.
    pub fn actions_for(&self, job_id: &JobId) -> Vec<AuditAction> {
        lock(&self.entries)
            .iter()
            .filter(|e| &e.job_id == job_id)
            .map(|e| e.action)
            .collect()
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::log("log store unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn mirror_job(&self, job: &Job) -> StoreResult<()> {
        self.check()?;
        lock(&self.rows).insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn append(&self, entry: &AuditLogEntry) -> StoreResult<()> {
        self.check()?;
        lock(&self.entries).push(entry.clone());
        Ok(())
    }
}
