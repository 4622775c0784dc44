//! Shared data models for the vaud conversion pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their status state machine
//! - Task descriptors carried on the queue
//! - Audit log entries
//! - Audio codec selection

pub mod audit;
pub mod codec;
pub mod job;
pub mod job_status;
pub mod task;

// Re-export common types
pub use audit::{AuditAction, AuditLogEntry};
pub use codec::{AudioCodec, ConversionSettings};
pub use job::{Job, JobId, TransitionError};
pub use job_status::JobStatus;
pub use task::TaskDescriptor;
