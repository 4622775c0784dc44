//! Task descriptor carried on the queue.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Job, JobId};

/// Minimal data a worker needs to process a job.
///
/// Wire shape: `{job_id, file_path, original_filename, user_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskDescriptor {
    pub job_id: JobId,
    #[serde(rename = "file_path")]
    pub input_ref: String,
    #[serde(rename = "original_filename")]
    pub original_name: String,
    #[serde(rename = "user_id", default)]
    pub owner: Option<String>,
}

impl TaskDescriptor {
    /// Decode a descriptor from a raw queue payload.
    pub fn from_slice(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&Job> for TaskDescriptor {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            input_ref: job.input_ref.clone(),
            original_name: job.original_filename.clone(),
            owner: job.owner.clone(),
        }
    }
}
