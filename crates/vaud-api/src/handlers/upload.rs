//! Upload handler.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use vaud_models::{JobId, JobStatus};

use crate::error::{ApiError, ApiResult};
use crate::services::Submission;
use crate::state::AppState;

/// Name used when the client sends none.
const FALLBACK_FILE_NAME: &str = "upload";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: &'static str,
}

/// `POST /upload`: multipart `file` plus optional `user_id`.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut owner: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or(FALLBACK_FILE_NAME).to_string();
                let content_type = field.content_type().map(|c| c.to_string());
                let data = field.bytes().await?;
                file = Some((name, content_type, data.to_vec()));
            }
            "user_id" => {
                let text = field.text().await?;
                owner = Some(text.trim().to_string()).filter(|t| !t.is_empty());
            }
            _ => {}
        }
    }

    let (original_name, content_type, data) =
        file.ok_or_else(|| ApiError::bad_request("Missing required 'file' field"))?;

    let job = state
        .submitter
        .submit(Submission {
            original_name,
            content_type,
            data,
            owner,
        })
        .await?;

    Ok(Json(UploadResponse {
        job_id: job.job_id,
        status: job.status,
        message: "File uploaded successfully. Conversion queued.",
    }))
}
