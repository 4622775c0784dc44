//! Audio conversion worker.
//!
//! This crate provides:
//! - A sequential consume loop with prefetch 1
//! - Reconnect with capped exponential backoff
//! - Job processing against the conversion engine and job store
//! - Graceful shutdown

pub mod backoff;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;

pub use backoff::ReconnectBackoff;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobWorker;
pub use logging::JobLogger;
pub use processor::{JobOutcome, JobProcessor};
