//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use vaud_models::{AudioCodec, ConversionSettings};

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Lines of non-progress stderr kept for error reporting.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set VBR audio quality.
    pub fn audio_quality(self, quality: u8) -> Self {
        self.output_arg("-q:a").output_arg(quality.to_string())
    }

    /// Extract the audio track with the given settings.
    pub fn extract_audio(self, settings: &ConversionSettings) -> Self {
        let cmd = self.no_video();
        match settings.codec {
            AudioCodec::Mp3 => cmd
                .output_args(["-acodec", "libmp3lame"])
                .audio_quality(settings.quality),
            AudioCodec::Aac => cmd.audio_codec("aac").audio_bitrate("128k"),
            AudioCodec::Copy => cmd.audio_codec("copy"),
        }
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push("error".to_string());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking.
///
/// There is no timeout: a hung FFmpeg blocks the caller until the future is
/// dropped, which kills the child.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: String,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a runner for `ffmpeg` on PATH.
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    /// Create a runner for a specific binary name or path.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve the binary to an executable path.
    pub fn locate(&self) -> MediaResult<PathBuf> {
        which::which(&self.binary).map_err(|_| MediaError::FfmpegNotFound(self.binary.clone()))
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// On a non-zero exit the error carries the tail of FFmpeg's
    /// non-progress stderr output.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let binary = self.locate()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound(self.binary.clone()),
                _ => MediaError::Io(e),
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr was not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        let stderr_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == DIAGNOSTIC_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }

            Vec::from(tail).join("\n")
        });

        let status = child.wait().await?;
        let diagnostics = stderr_handle.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(diagnostics, status.code().unwrap_or(-1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(codec: AudioCodec) -> Vec<String> {
        FfmpegCommand::new("in.mp4", "out.mp3")
            .extract_audio(&ConversionSettings::new(codec, 2))
            .build_args()
    }

    #[test]
    fn test_mp3_args() {
        let args = args_for(AudioCodec::Mp3);
        assert_eq!(args[0], "-y");
        let tail: Vec<&str> = args.iter().skip_while(|a| *a != "-i").map(String::as_str).collect();
        assert_eq!(
            tail,
            ["-i", "in.mp4", "-vn", "-acodec", "libmp3lame", "-q:a", "2", "out.mp3"]
        );
    }

    #[test]
    fn test_aac_and_copy_args() {
        let aac = args_for(AudioCodec::Aac);
        assert!(aac.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(aac.windows(2).any(|w| w == ["-b:a", "128k"]));

        let copy = args_for(AudioCodec::Copy);
        assert!(copy.windows(2).any(|w| w == ["-c:a", "copy"]));
        assert!(!copy.contains(&"-q:a".to_string()));
    }

    #[test]
    fn test_missing_binary() {
        let runner = FfmpegRunner::with_binary("vaud-no-such-ffmpeg");
        let err = runner.locate().unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
        assert!(err.to_string().contains("ffmpeg not found"));
    }
}
