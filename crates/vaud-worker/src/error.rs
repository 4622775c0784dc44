//! Worker error types.

use thiserror::Error;

use vaud_queue::QueueError;
use vaud_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that abort a consume session.
///
/// Job-level failures never show up here; they become a `failed` job.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// A store write or read failed mid-pipeline.
    pub fn is_persistence(&self) -> bool {
        matches!(self, WorkerError::Store(_))
    }

    /// The broker link is gone.
    pub fn is_transport(&self) -> bool {
        matches!(self, WorkerError::Queue(e) if e.is_transport())
    }
}
