//! Conversion job record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::JobStatus;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid job transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A single conversion job.
///
/// `output_ref`/`output_size` are only set on completed jobs and `error`
/// only on failed ones. The transition methods keep that true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Location of the submitted asset
    pub input_ref: String,
    pub original_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_size: Option<u64>,
    /// Submitter identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Location of the produced artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a freshly submitted job in `queued` state.
    pub fn new_queued(
        job_id: JobId,
        input_ref: impl Into<String>,
        original_filename: impl Into<String>,
        owner: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Queued,
            input_ref: input_ref.into(),
            original_filename: original_filename.into(),
            content_type: None,
            input_size: None,
            owner,
            output_ref: None,
            output_size: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_input_size(mut self, size: u64) -> Self {
        self.input_size = Some(size);
        self
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn guard(&self, to: JobStatus) -> Result<(), TransitionError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.status,
                to,
            })
        }
    }

    /// Move to `processing`.
    pub fn start_processing(&mut self) -> Result<(), TransitionError> {
        self.guard(JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `completed` with the produced artifact.
    pub fn complete(
        &mut self,
        output_ref: impl Into<String>,
        output_size: u64,
    ) -> Result<(), TransitionError> {
        self.guard(JobStatus::Completed)?;
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.output_ref = Some(output_ref.into());
        self.output_size = Some(output_size);
        self.error = None;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Move to `failed`. The stored error is never empty.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.guard(JobStatus::Failed)?;
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            "unknown error".to_string()
        } else {
            reason
        };
        self.status = JobStatus::Failed;
        self.error = Some(reason);
        self.output_ref = None;
        self.output_size = None;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued() -> Job {
        Job::new_queued(JobId::new(), "/tmp/uploads/a.mp4", "a.mp4", None)
    }

    #[test]
    fn test_happy_path() {
        let mut job = queued();
        job.start_processing().unwrap();
        job.complete("/tmp/outputs/a.mp3", 1024).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_size, Some(1024));
        assert!(job.completed_at.is_some());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_fail_always_sets_error() {
        let mut job = queued();
        job.start_processing().unwrap();
        job.fail("   ").unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("unknown error"));
        assert!(job.output_ref.is_none());
    }

    #[test]
    fn test_terminal_job_rejects_changes() {
        let mut job = queued();
        job.start_processing().unwrap();
        job.complete("/out.mp3", 10).unwrap();
        let before = job.clone();

        let err = job.fail("late failure").unwrap_err();
        assert_eq!(err.from, JobStatus::Completed);
        assert_eq!(err.to, JobStatus::Failed);
        assert!(job.start_processing().is_err());
        assert_eq!(job, before);
    }

    #[test]
    fn test_complete_requires_processing() {
        let mut job = queued();
        assert!(job.complete("/out.mp3", 10).is_err());
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn test_queued_job_omits_result_fields() {
        let json = serde_json::to_value(queued()).unwrap();
        assert_eq!(json["status"], "queued");
        assert!(json.get("error").is_none());
        assert!(json.get("output_ref").is_none());
    }
}
