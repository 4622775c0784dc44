//! Job query handlers.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use vaud_models::{Job, JobId};
use vaud_store::JobPage;

use crate::error::ApiResult;
use crate::state::AppState;

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub skip: u32,
}

fn default_limit() -> u32 {
    10
}

/// `GET /jobs`: newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    params: Result<Query<ListJobsParams>, QueryRejection>,
) -> ApiResult<Json<JobPage>> {
    let Query(params) = params?;
    let limit = params.limit.clamp(1, MAX_PAGE_SIZE);
    let page = state.store.list(limit, params.skip).await?;
    Ok(Json(page))
}

/// `GET /job/:job_id` and `GET /job/:job_id/info`.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.retriever.info(&JobId::from_string(job_id)).await?;
    Ok(Json(job))
}
