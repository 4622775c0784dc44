//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found on PATH (looked for `{0}`)")]
    FfmpegNotFound(String),

    /// `exit_code` is -1 when the process was killed by a signal.
    #[error("FFmpeg exited with code {exit_code}: {stderr}")]
    FfmpegFailed { stderr: String, exit_code: i32 },

    #[error("FFmpeg produced no output at {0}")]
    EmptyOutput(PathBuf),

    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(stderr: impl Into<String>, exit_code: i32) -> Self {
        let stderr = stderr.into();
        Self::FfmpegFailed {
            stderr: if stderr.trim().is_empty() {
                "no diagnostic output".to_string()
            } else {
                stderr
            },
            exit_code,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
