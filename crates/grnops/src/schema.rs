use serde::{Deserialize, Serialize};

/// Free-form algorithm parameters as submitted with a job.
pub type Params = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Weight statistics over the non-zero entries of an adjacency matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeStats {
    pub edges_count: u64,
    pub mean_weight: f64,
    pub max_weight: f64,
    pub min_weight: f64,
}

/// Normalized summary returned by every runner slot and written to
/// `metadata.json` on success.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub edges_count: u64,
    pub mean_weight: f64,
    pub max_weight: f64,
    pub min_weight: f64,
    pub output_files: Vec<String>,
    pub algorithm: String,
    pub output_dir: String,
    pub status: RunStatus,

    /// True when the deterministic placeholder produced the matrix.
    pub mock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    pub genes: usize,
    pub samples: usize,
    pub execution_time_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacency_digest: Option<String>, // blake3 hex of the adjacency file
}

/// `metadata.json` contents when a run fails.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub status: RunStatus,
    pub algorithm: String,
    pub error: String,
    pub output_dir: String,
}
