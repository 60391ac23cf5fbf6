use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use metastore::paginate;
use tracing::{info, warn};

use crate::error::GrnError;
use crate::store_exec::{with_store_blocking, SharedRepo};
use crate::types::{new_id, Page};
use crate::types_results::{ResultFile, ResultFilter, ResultRecord, ResultSummary};

#[derive(Clone)]
pub struct ResultsRegistry {
    repo: SharedRepo<ResultRecord>,
    results_dir: PathBuf,
}

impl ResultsRegistry {
    pub fn new(repo: SharedRepo<ResultRecord>, results_dir: PathBuf) -> Self {
        Self { repo, results_dir }
    }

    pub async fn create(
        &self,
        job_id: &str,
        dataset_id: &str,
        algorithm: &str,
        summary: ResultSummary,
    ) -> Result<ResultRecord, GrnError> {
        let now = Utc::now();
        let record = ResultRecord {
            id: new_id("result"),
            job_id: job_id.to_string(),
            dataset_id: dataset_id.to_string(),
            algorithm: algorithm.to_string(),
            summary,
            output_files: Vec::new(),
            size_bytes: None,
            created_at: now,
            updated_at: now,
        };
        let rec = record.clone();
        with_store_blocking(self.repo.clone(), move |repo| Ok(repo.put(&rec)?)).await?;
        info!(result_id = %record.id, job_id, "result recorded");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ResultRecord>, GrnError> {
        let id = id.to_string();
        with_store_blocking(self.repo.clone(), move |repo| Ok(repo.get(&id)?)).await
    }

    /// First match in storage order.
    pub async fn get_by_job(&self, job_id: &str) -> Result<Option<ResultRecord>, GrnError> {
        let job_id = job_id.to_string();
        with_store_blocking(self.repo.clone(), move |repo| {
            Ok(repo.list()?.into_iter().find(|r| r.job_id == job_id))
        })
        .await
    }

    /// Newest first.
    pub async fn list(&self, filter: ResultFilter, page: Page) -> Result<Vec<ResultRecord>, GrnError> {
        let mut items = self.filtered(filter).await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, page.skip, page.limit))
    }

    pub async fn count(&self, filter: ResultFilter) -> Result<usize, GrnError> {
        Ok(self.filtered(filter).await?.len())
    }

    async fn filtered(&self, filter: ResultFilter) -> Result<Vec<ResultRecord>, GrnError> {
        with_store_blocking(self.repo.clone(), move |repo| {
            Ok(repo.list()?.into_iter().filter(|r| filter.matches(r)).collect())
        })
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, GrnError> {
        let id = id.to_string();
        with_store_blocking(self.repo.clone(), move |repo| Ok(repo.delete(&id)?)).await
    }

    pub async fn update(
        &self,
        id: &str,
        output_files: Vec<String>,
        size_bytes: Option<u64>,
    ) -> Result<Option<ResultRecord>, GrnError> {
        let id = id.to_string();
        with_store_blocking(self.repo.clone(), move |repo| {
            let Some(mut r) = repo.get(&id)? else {
                return Ok(None);
            };
            r.output_files = output_files;
            r.size_bytes = size_bytes;
            r.updated_at = Utc::now();
            repo.put(&r)?;
            Ok(Some(r))
        })
        .await
    }

    /// Files in the job's output directory; empty when the result or the
    /// directory is unknown.
    pub async fn list_files(&self, result_id: &str) -> Result<Vec<ResultFile>, GrnError> {
        let Some(result) = self.get(result_id).await? else {
            return Ok(Vec::new());
        };
        let dir = self.results_dir.join(&result.job_id);
        Ok(tokio::task::spawn_blocking(move || list_dir(&dir)).await?)
    }

    /// Resolves `filename` inside the result's output directory. Names with
    /// separators or `..` are rejected, and the canonical path must stay
    /// under that directory.
    pub async fn get_file(&self, result_id: &str, filename: &str) -> Result<Option<PathBuf>, GrnError> {
        if !is_plain_filename(filename) {
            return Err(GrnError::Validation(format!("Invalid filename: {filename:?}")));
        }
        let Some(result) = self.get(result_id).await? else {
            return Ok(None);
        };

        let dir = self.results_dir.join(&result.job_id);
        let candidate = dir.join(filename);
        let (Ok(root), Ok(resolved)) = (tokio::fs::canonicalize(&dir).await, tokio::fs::canonicalize(&candidate).await)
        else {
            return Ok(None);
        };
        if !resolved.starts_with(&root) {
            warn!(result_id, filename, "download path escapes the result directory");
            return Ok(None);
        }
        match tokio::fs::metadata(&resolved).await {
            Ok(m) if m.is_file() => Ok(Some(resolved)),
            _ => Ok(None),
        }
    }
}

fn is_plain_filename(name: &str) -> bool {
    if name.is_empty() || name.contains(&['/', '\\'][..]) || name.contains("..") {
        return false;
    }
    let mut comps = Path::new(name).components();
    matches!((comps.next(), comps.next()), (Some(Component::Normal(_)), None))
}

fn list_dir(dir: &Path) -> Vec<ResultFile> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<ResultFile> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            meta.is_file().then(|| ResultFile { filename: e.file_name().to_string_lossy().into_owned(), size_bytes: meta.len() })
        })
        .collect();
    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    files
}

/// Total size of regular files directly inside `dir`.
pub fn dir_size(dir: &Path) -> Option<u64> {
    let files = list_dir(dir);
    (!files.is_empty()).then(|| files.iter().map(|f| f.size_bytes).sum())
}
