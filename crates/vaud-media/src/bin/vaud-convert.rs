//! Convert a local video file to audio without the queue.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vaud_media::{ConversionEngine, FfmpegEngine};
use vaud_models::{AudioCodec, ConversionSettings};

#[derive(Debug, Parser)]
#[command(name = "vaud-convert", version, about = "Convert a video file to audio using ffmpeg")]
struct Cli {
    /// Video file to convert
    input: PathBuf,

    /// Output audio file path (defaults next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Audio codec: mp3, aac or copy
    #[arg(long, default_value = "mp3")]
    codec: AudioCodec,

    /// MP3 quality, 0 (best) to 9 (worst)
    #[arg(long, default_value_t = ConversionSettings::DEFAULT_QUALITY,
          value_parser = clap::value_parser!(u8).range(0..=9))]
    quality: u8,
}

impl Cli {
    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output(&self.input, self.codec))
    }
}

fn default_output(input: &Path, codec: AudioCodec) -> PathBuf {
    input.with_extension(codec.extension())
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if !cli.input.is_file() {
        eprintln!("Input file not found: {}", cli.input.display());
        return ExitCode::FAILURE;
    }

    let output = cli.output_path();
    let settings = ConversionSettings::new(cli.codec, cli.quality);

    match FfmpegEngine::default()
        .convert(&cli.input, &output, &settings)
        .await
    {
        Ok(result) => {
            println!("Conversion succeeded -> {}", result.output_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Conversion failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["vaud-convert", "clip.mp4"]).unwrap();
        assert_eq!(cli.codec, AudioCodec::Mp3);
        assert_eq!(cli.quality, 2);
        assert_eq!(cli.output_path(), PathBuf::from("clip.mp3"));
    }

    #[test]
    fn test_output_extension_follows_codec() {
        let cli = Cli::try_parse_from(["vaud-convert", "/v/talk.mov", "--codec", "copy"]).unwrap();
        assert_eq!(cli.output_path(), PathBuf::from("/v/talk.m4a"));

        let cli = Cli::try_parse_from(["vaud-convert", "talk.mov", "-o", "out/a.aac"]).unwrap();
        assert_eq!(cli.output_path(), PathBuf::from("out/a.aac"));
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["vaud-convert", "a.mp4", "--codec", "flac"]).is_err());
        assert!(Cli::try_parse_from(["vaud-convert", "a.mp4", "--quality", "12"]).is_err());
        assert!(Cli::try_parse_from(["vaud-convert"]).is_err());
    }
}
