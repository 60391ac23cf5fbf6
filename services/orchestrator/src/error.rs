use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use grnops::GrnOpsError;
use metastore::MetaStoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::types_jobs::JobStatus;

#[derive(Debug, Error)]
pub enum GrnError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Dataset with name '{0}' already exists")]
    DuplicateName(String),

    #[error("File not found: {0}")]
    LocalFileNotFound(String),

    #[error("Hugging Face dataset not found: {0}")]
    RemoteDatasetNotFound(String),

    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Algorithm '{algorithm}' not supported. Supported: {supported}")]
    UnsupportedAlgorithm { algorithm: String, supported: String },

    #[error("Failed to load dataset: {0}")]
    DatasetLoadFailure(String),

    #[error("{0}")]
    ExecutionFailure(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Task dispatch failed: {0}")]
    Dispatch(String),

    #[error(transparent)]
    Store(#[from] MetaStoreError),

    #[error("{0}")]
    Internal(String),
}

impl GrnError {
    pub fn unsupported(algorithm: &str, supported: &[String]) -> Self {
        GrnError::UnsupportedAlgorithm { algorithm: algorithm.to_string(), supported: supported.join(", ") }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GrnError::Validation(_)
            | GrnError::LocalFileNotFound(_)
            | GrnError::RemoteDatasetNotFound(_)
            | GrnError::UnsupportedAlgorithm { .. }
            | GrnError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            GrnError::NotFound(_) | GrnError::DatasetNotFound(_) => StatusCode::NOT_FOUND,
            GrnError::DuplicateName(_) => StatusCode::CONFLICT,
            GrnError::DatasetLoadFailure(_)
            | GrnError::ExecutionFailure(_)
            | GrnError::Dispatch(_)
            | GrnError::Store(_)
            | GrnError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GrnOpsError> for GrnError {
    fn from(e: GrnOpsError) -> Self {
        match e {
            GrnOpsError::UnsupportedAlgorithm { algorithm, supported } => {
                GrnError::UnsupportedAlgorithm { algorithm, supported }
            }
            GrnOpsError::DatasetLoad(msg) => GrnError::DatasetLoadFailure(msg),
            other => GrnError::ExecutionFailure(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for GrnError {
    fn from(e: tokio::task::JoinError) -> Self {
        GrnError::Internal(format!("blocking task failed: {e}"))
    }
}

#[derive(Serialize)]
pub struct ApiError {
    pub detail: String,
}

impl IntoResponse for GrnError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ApiError { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GrnError::DuplicateName("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(GrnError::DatasetNotFound("d".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(GrnError::unsupported("Foo", &["CLR".into()]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(GrnError::Internal("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_ops_errors_keep_taxonomy() {
        let e: GrnError = GrnOpsError::DatasetLoad("bad csv".into()).into();
        assert!(matches!(e, GrnError::DatasetLoadFailure(_)));
        let e: GrnError = GrnOpsError::Execution("boom".into()).into();
        assert_eq!(e.to_string(), "boom");
    }
}
