//! Audio extraction via FFmpeg.
//!
//! This crate provides:
//! - An FFmpeg command builder
//! - A runner that captures progress and diagnostic output
//! - The [`ConversionEngine`] seam used by the worker

pub mod command;
pub mod engine;
pub mod error;
pub mod progress;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use engine::{ConversionEngine, ConversionOutput, FfmpegEngine};
pub use error::{MediaError, MediaResult};
pub use progress::FfmpegProgress;
