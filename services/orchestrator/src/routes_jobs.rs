use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::error::GrnError;
use crate::state::SharedState;
use crate::types::PageQuery;
use crate::types_jobs::{CancelRequested, JobCreate, JobListResponse, JobLogsResponse, JobRecord};

fn not_found(id: &str) -> GrnError {
    GrnError::NotFound(format!("Job {id} not found"))
}

pub async fn create_job(
    State(state): State<SharedState>,
    Json(req): Json<JobCreate>,
) -> Result<(StatusCode, Json<JobRecord>), GrnError> {
    let job = state.jobs.submit(req).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_jobs(
    State(state): State<SharedState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<JobListResponse>, GrnError> {
    let page = q.validate()?;
    let jobs = state.jobs.list(page).await?;
    let total = state.jobs.count().await?;
    Ok(Json(JobListResponse { total, jobs }))
}

pub async fn get_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, GrnError> {
    state.jobs.status(&id).await?.map(Json).ok_or_else(|| not_found(&id))
}

pub async fn get_job_logs(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<JobLogsResponse>, GrnError> {
    let logs = state.jobs.logs(&id).await?.ok_or_else(|| not_found(&id))?;
    Ok(Json(JobLogsResponse { job_id: id, logs, timestamp: Utc::now() }))
}

/// Synchronous cancel: 204, or 400 when the job already finished.
pub async fn cancel_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, GrnError> {
    if state.jobs.status(&id).await?.is_none() {
        return Err(not_found(&id));
    }
    if state.jobs.cancel(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(GrnError::Validation(format!("Job {id} cannot be cancelled")))
    }
}

/// Queues a `cancel_job` task; poll the job for the outcome.
pub async fn request_cancel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CancelRequested>), GrnError> {
    if state.jobs.status(&id).await?.is_none() {
        return Err(not_found(&id));
    }
    match state.jobs.request_cancel(&id).await? {
        Some(task_id) => Ok((StatusCode::ACCEPTED, Json(CancelRequested { job_id: id, task_id }))),
        None => Err(GrnError::Validation(format!("Job {id} cannot be cancelled"))),
    }
}
