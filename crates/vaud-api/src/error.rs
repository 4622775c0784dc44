//! API error types.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use vaud_store::StoreError;

use crate::services::{RetrieveError, SubmitError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::JobNotFound(_) => Self::not_found("Job not found"),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::InvalidContentType(_) => Self::bad_request(e.to_string()),
            SubmitError::Store(e) => e.into(),
            SubmitError::Storage(_) | SubmitError::Publish(_) => Self::internal(e.to_string()),
        }
    }
}

impl From<RetrieveError> for ApiError {
    fn from(e: RetrieveError) -> Self {
        match e {
            RetrieveError::NotFound(msg) => Self::not_found(msg),
            RetrieveError::InvalidState(_) => Self::bad_request(e.to_string()),
            RetrieveError::Store(e) => e.into(),
            RetrieveError::Storage(e) => Self::internal(e.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::bad_request(e.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(ErrorResponse { detail: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaud_models::{JobId, JobStatus};

    #[test]
    fn test_retrieve_error_mapping() {
        let e = ApiError::from(RetrieveError::InvalidState(JobStatus::Processing));
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.to_string(), "Job is not completed. Current status: processing");

        let e = ApiError::from(RetrieveError::NotFound("Audio file not found"));
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_submit_error_mapping() {
        let e = ApiError::from(SubmitError::InvalidContentType("text/plain".into()));
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            e.to_string(),
            "Invalid file type: text/plain. Please upload a video file."
        );

        let e = ApiError::from(SubmitError::Store(StoreError::state("down")));
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_job_is_404() {
        let e = ApiError::from(StoreError::JobNotFound(JobId::from_string("x")));
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
    }
}
