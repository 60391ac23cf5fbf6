use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::GrnError;
use crate::state::SharedState;
use crate::types::PageQuery;
use crate::types_datasets::{DatasetCreate, DatasetListResponse, DatasetRecord, DatasetSchema, DatasetUpdate};

fn not_found(id: &str) -> GrnError {
    GrnError::NotFound(format!("Dataset {id} not found"))
}

pub async fn create_dataset(
    State(state): State<SharedState>,
    Json(req): Json<DatasetCreate>,
) -> Result<(StatusCode, Json<DatasetRecord>), GrnError> {
    let ds = state.datasets.register(req).await?;
    Ok((StatusCode::CREATED, Json(ds)))
}

pub async fn list_datasets(
    State(state): State<SharedState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<DatasetListResponse>, GrnError> {
    let page = q.validate()?;
    let datasets = state.datasets.list(page).await?;
    let total = state.datasets.count().await?;
    Ok(Json(DatasetListResponse { total, datasets }))
}

pub async fn get_dataset(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DatasetRecord>, GrnError> {
    state.datasets.get(&id).await?.map(Json).ok_or_else(|| not_found(&id))
}

pub async fn get_schema(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DatasetSchema>, GrnError> {
    if state.datasets.get(&id).await?.is_none() {
        return Err(not_found(&id));
    }
    state
        .datasets
        .schema(&id)
        .await?
        .map(Json)
        .ok_or_else(|| GrnError::NotFound(format!("Schema for dataset {id} is not available")))
}

pub async fn update_dataset(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(patch): Json<DatasetUpdate>,
) -> Result<Json<DatasetRecord>, GrnError> {
    state.datasets.update_metadata(&id, patch).await?.map(Json).ok_or_else(|| not_found(&id))
}

pub async fn delete_dataset(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, GrnError> {
    if state.datasets.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}
