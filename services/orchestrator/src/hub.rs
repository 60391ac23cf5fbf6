//! Dataset hub access (Hugging Face hub API + datasets-server rows API).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

const ROWS_PAGE: usize = 100;

/// `owner/name` style identifiers: a separator, no leading root, no scheme.
pub fn is_hub_identifier(path: &str) -> bool {
    path.contains('/') && !path.starts_with('/') && !path.starts_with('\\') && !path.contains(':')
}

/// Rows materialised from the hub, columns in feature order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubRows {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

#[async_trait]
pub trait HubClient: Send + Sync {
    async fn exists(&self, repo_id: &str) -> Result<bool>;
    /// Best-effort sum of the repository's file sizes.
    async fn size_bytes(&self, repo_id: &str) -> Result<Option<u64>>;
    async fn first_row(&self, repo_id: &str) -> Result<HubRows>;
    async fn rows(&self, repo_id: &str) -> Result<HubRows>;
}

pub struct HttpHubClient {
    api_url: String,
    rows_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpHubClient {
    pub fn new(api_url: String, rows_url: String, token: Option<String>) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            rows_url: rows_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    /// (config, split) to read rows from; prefers the `train` split.
    async fn pick_split(&self, repo_id: &str) -> Result<(String, String)> {
        let url = format!("{}/splits", self.rows_url);
        let resp: SplitsResponse = self
            .get(url)
            .query(&[("dataset", repo_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("invalid /splits response")?;

        let split = resp
            .splits
            .iter()
            .find(|s| s.split == "train")
            .or_else(|| resp.splits.first())
            .ok_or_else(|| anyhow!("dataset {repo_id} has no splits"))?;
        Ok((split.config.clone(), split.split.clone()))
    }
}

#[derive(Deserialize)]
struct SplitsResponse {
    splits: Vec<SplitEntry>,
}

#[derive(Deserialize)]
struct SplitEntry {
    config: String,
    split: String,
}

#[derive(Deserialize)]
struct RowsResponse {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    rows: Vec<RowEntry>,
    #[serde(default)]
    num_rows_total: Option<usize>,
}

#[derive(Deserialize)]
struct Feature {
    name: String,
}

#[derive(Deserialize)]
struct RowEntry {
    row: Map<String, Value>,
}

#[derive(Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
}

impl RowsResponse {
    fn columns(&self) -> Vec<String> {
        if !self.features.is_empty() {
            return self.features.iter().map(|f| f.name.clone()).collect();
        }
        self.rows.first().map(|r| r.row.keys().cloned().collect()).unwrap_or_default()
    }
}

#[async_trait]
impl HubClient for HttpHubClient {
    async fn exists(&self, repo_id: &str) -> Result<bool> {
        let url = format!("{}/api/datasets/{repo_id}", self.api_url);
        let resp = self.get(url).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            s => Err(anyhow!("hub returned HTTP {s} for {repo_id}")),
        }
    }

    async fn size_bytes(&self, repo_id: &str) -> Result<Option<u64>> {
        let url = format!("{}/api/datasets/{repo_id}/tree/main", self.api_url);
        let entries: Vec<TreeEntry> = self
            .get(url)
            .query(&[("recursive", "true")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let total: u64 = entries.iter().filter(|e| e.kind == "file").map(|e| e.size).sum();
        Ok(Some(total))
    }

    async fn first_row(&self, repo_id: &str) -> Result<HubRows> {
        let (config, split) = self.pick_split(repo_id).await?;
        let url = format!("{}/first-rows", self.rows_url);
        let resp: RowsResponse = self
            .get(url)
            .query(&[("dataset", repo_id), ("config", config.as_str()), ("split", split.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(HubRows { columns: resp.columns(), rows: resp.rows.into_iter().take(1).map(|r| r.row).collect() })
    }

    async fn rows(&self, repo_id: &str) -> Result<HubRows> {
        let (config, split) = self.pick_split(repo_id).await?;
        let url = format!("{}/rows", self.rows_url);
        let length = ROWS_PAGE.to_string();

        let mut out = HubRows::default();
        let mut offset = 0usize;
        loop {
            let offset_s = offset.to_string();
            let page: RowsResponse = self
                .get(url.clone())
                .query(&[
                    ("dataset", repo_id),
                    ("config", config.as_str()),
                    ("split", split.as_str()),
                    ("offset", offset_s.as_str()),
                    ("length", length.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            if out.columns.is_empty() {
                out.columns = page.columns();
            }
            let n = page.rows.len();
            out.rows.extend(page.rows.into_iter().map(|r| r.row));
            offset += n;
            debug!(repo_id, fetched = offset, "hub rows page");

            let done = match page.num_rows_total {
                Some(total) => offset >= total,
                None => n < ROWS_PAGE,
            };
            if n == 0 || done {
                break;
            }
        }
        Ok(out)
    }
}

/// JSON runtime type name of a hub cell.
pub fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
