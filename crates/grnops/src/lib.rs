//! GRN inference operations
//!
//! Expression loading, adjacency matrix handling, the runner registry and the
//! pipeline that ties them together for one job's output directory.

pub mod expression;
pub mod matrix;
pub mod mock;
pub mod pipeline;
pub mod runner;
pub mod schema;
pub mod steplog;
pub mod table;

pub use expression::ExpressionMatrix;
pub use matrix::AdjacencyMatrix;
pub use mock::{mock_adjacency, DEFAULT_MOCK_SEED, MOCK_SPARSITY};
pub use pipeline::{merge_params, run_pipeline, run_pipeline_until, write_failure, METADATA_FILE, STOPPED_MESSAGE};
pub use runner::{GrnRunner, MockRunner, RunContext, RunOutcome, RunnerRegistry, ToolRunner};
pub use schema::*;
pub use steplog::StepLog;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrnOpsError {
    #[error("Algorithm '{algorithm}' not supported. Supported: {supported}")]
    UnsupportedAlgorithm { algorithm: String, supported: String },

    #[error("Failed to load dataset: {0}")]
    DatasetLoad(String),

    #[error("{0}")]
    Execution(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GrnOpsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GrnOpsError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, GrnOpsError>;
