use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use metastore::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    Expression,
    Perturbation,
    Synthetic,
    Benchmark,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub dataset_type: DatasetType,
    /// Local path or hub identifier (`owner/name`).
    pub file_path: String,
    pub genes: Option<u64>,
    pub samples: Option<u64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub is_hf_dataset: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for DatasetRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub dataset_type: DatasetType,
    pub file_path: String,
    #[serde(default)]
    pub genes: Option<u64>,
    #[serde(default)]
    pub samples: Option<u64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// PATCH body; `metadata` keys are merged into the stored mapping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasetSchema {
    pub dataset_id: String,
    pub columns: Vec<String>,
    pub dtypes: BTreeMap<String, String>,
    /// Unknown for hub datasets.
    pub row_count: Option<u64>,
    pub column_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DatasetListResponse {
    pub total: usize,
    pub datasets: Vec<DatasetRecord>,
}
