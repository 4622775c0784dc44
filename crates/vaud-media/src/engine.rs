//! Conversion engine seam and its FFmpeg implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use vaud_models::ConversionSettings;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutput {
    pub exit_code: i32,
    pub output_path: PathBuf,
    /// Artifact size in bytes, always non-zero
    pub output_size: u64,
}

/// External process that turns an input asset into an audio artifact.
///
/// A non-zero exit or a missing/empty artifact is an error carrying the
/// engine's diagnostic text.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        settings: &ConversionSettings,
    ) -> MediaResult<ConversionOutput>;
}

/// [`ConversionEngine`] backed by the `ffmpeg` binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    runner: FfmpegRunner,
}

impl FfmpegEngine {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    /// Use a specific binary name or path instead of `ffmpeg`.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self::new(FfmpegRunner::with_binary(binary))
    }

    /// Resolve the FFmpeg executable this engine will run.
    pub fn locate(&self) -> MediaResult<PathBuf> {
        self.runner.locate()
    }
}

#[async_trait]
impl ConversionEngine for FfmpegEngine {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        settings: &ConversionSettings,
    ) -> MediaResult<ConversionOutput> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let cmd = FfmpegCommand::new(input, output).extract_audio(settings);
        info!(
            "Extracting {} audio from {} to {}",
            settings.codec,
            input.display(),
            output.display()
        );

        self.runner
            .run_with_progress(&cmd, |p| {
                debug!(out_time_ms = p.out_time_ms, speed = p.speed, "ffmpeg progress");
            })
            .await?;

        let output_size = match tokio::fs::metadata(output).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => 0,
        };
        if output_size == 0 {
            return Err(MediaError::EmptyOutput(output.to_path_buf()));
        }

        Ok(ConversionOutput {
            exit_code: 0,
            output_path: output.to_path_buf(),
            output_size,
        })
    }
}
