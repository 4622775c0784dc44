//! Append-only audit trail entries.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Upload,
    ProcessingStarted,
    ProcessingCompleted,
    ProcessingFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Upload => "upload",
            AuditAction::ProcessingStarted => "processing_started",
            AuditAction::ProcessingCompleted => "processing_completed",
            AuditAction::ProcessingFailed => "processing_failed",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable audit record. Diagnostic only, never used to derive state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AuditLogEntry {
    pub job_id: JobId,
    pub action: AuditAction,
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(job_id: JobId, action: AuditAction, details: serde_json::Value) -> Self {
        Self {
            job_id,
            action,
            details,
            timestamp: Utc::now(),
        }
    }
}
