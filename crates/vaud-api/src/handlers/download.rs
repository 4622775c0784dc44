//! Artifact download.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::info;

use vaud_models::JobId;

use crate::error::ApiResult;
use crate::state::AppState;

/// `GET /download/:job_id`: stream the converted audio.
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job_id = JobId::from_string(job_id);
    let artifact = state.retriever.resolve(&job_id).await?;
    info!("Serving {} ({} bytes)", artifact.file_name, artifact.size);

    let headers = [
        (header::CONTENT_TYPE, artifact.content_type.to_string()),
        (header::CONTENT_LENGTH, artifact.size.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        ),
    ];
    let body = Body::from_stream(ReaderStream::new(artifact.file));

    Ok((headers, body).into_response())
}
