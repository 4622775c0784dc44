//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// No regular file at the given path
    #[error("File not found: {0}")]
    NotFound(String),

    /// Writing a submitted asset failed; the partial file is already gone
    #[error("Failed to store upload: {0}")]
    UploadFailed(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }
}
