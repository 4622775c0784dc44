//! Store error types.

use thiserror::Error;

use vaud_models::JobId;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("State store error: {0}")]
    State(String),

    #[error("Log store error: {0}")]
    Log(String),
}

impl StoreError {
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn log(msg: impl Into<String>) -> Self {
        Self::Log(msg.into())
    }
}

impl From<vaud_firestore::FirestoreError> for StoreError {
    fn from(e: vaud_firestore::FirestoreError) -> Self {
        Self::State(e.to_string())
    }
}

impl From<vaud_ledger::LedgerError> for StoreError {
    fn from(e: vaud_ledger::LedgerError) -> Self {
        Self::Log(e.to_string())
    }
}
