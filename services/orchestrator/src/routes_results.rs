use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::GrnError;
use crate::state::SharedState;
use crate::types::PageQuery;
use crate::types_results::{ResultFilesResponse, ResultFilter, ResultListResponse, ResultRecord};

#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    pub dataset_id: Option<String>,
    pub algorithm: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

fn not_found(id: &str) -> GrnError {
    GrnError::NotFound(format!("Result {id} not found"))
}

pub async fn list_results(
    State(state): State<SharedState>,
    Query(q): Query<ResultQuery>,
) -> Result<Json<ResultListResponse>, GrnError> {
    let page = PageQuery { skip: q.skip, limit: q.limit }.validate()?;
    let filter = ResultFilter { dataset_id: q.dataset_id, algorithm: q.algorithm };
    let results = state.results.list(filter.clone(), page).await?;
    let total = state.results.count(filter).await?;
    Ok(Json(ResultListResponse { total, results }))
}

pub async fn get_result(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ResultRecord>, GrnError> {
    state.results.get(&id).await?.map(Json).ok_or_else(|| not_found(&id))
}

pub async fn list_result_files(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ResultFilesResponse>, GrnError> {
    if state.results.get(&id).await?.is_none() {
        return Err(not_found(&id));
    }
    let files = state.results.list_files(&id).await?;
    Ok(Json(ResultFilesResponse { result_id: id, files }))
}

pub async fn download_file(
    State(state): State<SharedState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, GrnError> {
    let path = state
        .results
        .get_file(&id, &filename)
        .await?
        .ok_or_else(|| GrnError::NotFound(format!("File {filename} not found for result {id}")))?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| GrnError::Internal(format!("{}: {e}", path.display())))?;

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
    ];
    Ok((headers, bytes))
}

pub async fn delete_result(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, GrnError> {
    if state.results.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}
