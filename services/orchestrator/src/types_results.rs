use chrono::{DateTime, Utc};
use grnops::ResultPayload;
use metastore::Record;
use serde::{Deserialize, Serialize};

/// Summary statistics kept on the Result record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultSummary {
    pub edges_count: u64,
    pub mean_weight: f64,
    pub max_weight: f64,
    pub min_weight: f64,
    pub mock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub execution_time_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacency_digest: Option<String>,
}

impl From<&ResultPayload> for ResultSummary {
    fn from(p: &ResultPayload) -> Self {
        Self {
            edges_count: p.edges_count,
            mean_weight: p.mean_weight,
            max_weight: p.max_weight,
            min_weight: p.min_weight,
            mock: p.mock,
            note: p.note.clone(),
            execution_time_seconds: p.execution_time_seconds,
            adjacency_digest: p.adjacency_digest.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    pub id: String,
    pub job_id: String,
    pub dataset_id: String,
    pub algorithm: String,
    pub summary: ResultSummary,
    #[serde(default)]
    pub output_files: Vec<String>,
    pub size_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for ResultRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultFilter {
    pub dataset_id: Option<String>,
    pub algorithm: Option<String>,
}

impl ResultFilter {
    pub fn matches(&self, r: &ResultRecord) -> bool {
        self.dataset_id.as_deref().map_or(true, |d| r.dataset_id == d)
            && self.algorithm.as_deref().map_or(true, |a| r.algorithm == a)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultFile {
    pub filename: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct ResultListResponse {
    pub total: usize,
    pub results: Vec<ResultRecord>,
}

#[derive(Debug, Serialize)]
pub struct ResultFilesResponse {
    pub result_id: String,
    pub files: Vec<ResultFile>,
}
