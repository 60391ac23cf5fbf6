use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use grnops::table::split_record;
use metastore::paginate;
use tracing::{info, warn};

use crate::error::GrnError;
use crate::hub::{is_hub_identifier, json_type_name, HubClient};
use crate::store_exec::{with_store_blocking, SharedRepo};
use crate::types::{new_id, Page};
use crate::types_datasets::{DatasetCreate, DatasetRecord, DatasetSchema, DatasetUpdate};

#[derive(Clone)]
pub struct DatasetRegistry {
    repo: SharedRepo<DatasetRecord>,
    hub: Arc<dyn HubClient>,
}

impl DatasetRegistry {
    pub fn new(repo: SharedRepo<DatasetRecord>, hub: Arc<dyn HubClient>) -> Self {
        Self { repo, hub }
    }

    pub async fn register(&self, req: DatasetCreate) -> Result<DatasetRecord, GrnError> {
        let name = req.name.trim().to_string();
        let file_path = req.file_path.trim().to_string();
        if name.is_empty() {
            return Err(GrnError::Validation("name must not be empty".into()));
        }
        if file_path.is_empty() {
            return Err(GrnError::Validation("file_path must not be empty".into()));
        }
        if self.find_by_name(&name).await?.is_some() {
            return Err(GrnError::DuplicateName(name));
        }

        let is_hf_dataset = is_hub_identifier(&file_path);
        let size_bytes = if is_hf_dataset {
            self.check_remote(&file_path).await?
        } else {
            let meta = tokio::fs::metadata(&file_path)
                .await
                .map_err(|_| GrnError::LocalFileNotFound(file_path.clone()))?;
            if !meta.is_file() {
                return Err(GrnError::LocalFileNotFound(file_path));
            }
            Some(meta.len())
        };

        let now = Utc::now();
        let record = DatasetRecord {
            id: new_id("dataset"),
            name,
            description: req.description,
            dataset_type: req.dataset_type,
            file_path,
            genes: req.genes,
            samples: req.samples,
            metadata: req.metadata,
            size_bytes,
            is_hf_dataset,
            created_at: now,
            updated_at: now,
        };

        // Re-check under the store lock: the reachability probe above awaited.
        let rec = record.clone();
        with_store_blocking(self.repo.clone(), move |repo| {
            if repo.list()?.iter().any(|d| d.name == rec.name) {
                return Err(GrnError::DuplicateName(rec.name.clone()));
            }
            repo.put(&rec)?;
            Ok(())
        })
        .await?;

        info!(dataset_id = %record.id, name = %record.name, hf = record.is_hf_dataset, "dataset registered");
        Ok(record)
    }

    async fn check_remote(&self, repo_id: &str) -> Result<Option<u64>, GrnError> {
        match self.hub.exists(repo_id).await {
            Ok(true) => {}
            Ok(false) => return Err(GrnError::RemoteDatasetNotFound(repo_id.to_string())),
            Err(e) => {
                warn!(repo_id, "hub lookup failed: {e:#}");
                return Err(GrnError::RemoteDatasetNotFound(repo_id.to_string()));
            }
        }
        match self.hub.size_bytes(repo_id).await {
            Ok(size) => Ok(size),
            Err(e) => {
                warn!(repo_id, "hub size listing failed: {e:#}");
                Ok(None)
            }
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<DatasetRecord>, GrnError> {
        let name = name.to_string();
        with_store_blocking(self.repo.clone(), move |repo| {
            Ok(repo.list()?.into_iter().find(|d| d.name == name))
        })
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<DatasetRecord>, GrnError> {
        let id = id.to_string();
        with_store_blocking(self.repo.clone(), move |repo| Ok(repo.get(&id)?)).await
    }

    /// Insertion order.
    pub async fn list(&self, page: Page) -> Result<Vec<DatasetRecord>, GrnError> {
        with_store_blocking(self.repo.clone(), move |repo| Ok(paginate(repo.list()?, page.skip, page.limit))).await
    }

    pub async fn count(&self) -> Result<usize, GrnError> {
        with_store_blocking(self.repo.clone(), |repo| Ok(repo.count()?)).await
    }

    /// Removes only the dataset record; jobs and results keep their ids.
    pub async fn delete(&self, id: &str) -> Result<bool, GrnError> {
        let id = id.to_string();
        let deleted = with_store_blocking(self.repo.clone(), {
            let id = id.clone();
            move |repo| Ok(repo.delete(&id)?)
        })
        .await?;
        if deleted {
            info!(dataset_id = %id, "dataset deleted");
        }
        Ok(deleted)
    }

    pub async fn update_metadata(&self, id: &str, patch: DatasetUpdate) -> Result<Option<DatasetRecord>, GrnError> {
        let id = id.to_string();
        with_store_blocking(self.repo.clone(), move |repo| {
            let Some(mut ds) = repo.get(&id)? else {
                return Ok(None);
            };
            for (k, v) in patch.metadata {
                ds.metadata.insert(k, v);
            }
            if patch.description.is_some() {
                ds.description = patch.description;
            }
            ds.updated_at = Utc::now();
            repo.put(&ds)?;
            Ok(Some(ds))
        })
        .await
    }

    /// Column names, types and row count. Read failures are logged and
    /// reported as `None`.
    pub async fn schema(&self, id: &str) -> Result<Option<DatasetSchema>, GrnError> {
        let Some(ds) = self.get(id).await? else {
            return Ok(None);
        };

        let schema = if ds.is_hf_dataset {
            self.remote_schema(&ds).await
        } else {
            let ds2 = ds.clone();
            tokio::task::spawn_blocking(move || local_schema(&ds2.id, Path::new(&ds2.file_path)))
                .await
                .map_err(anyhow::Error::from)
                .and_then(|r| r)
        };

        match schema {
            Ok(s) => Ok(Some(s)),
            Err(e) => {
                warn!(dataset_id = %ds.id, "schema read failed: {e:#}");
                Ok(None)
            }
        }
    }

    async fn remote_schema(&self, ds: &DatasetRecord) -> anyhow::Result<DatasetSchema> {
        let first = self.hub.first_row(&ds.file_path).await?;
        let row = first.rows.first();
        let dtypes = first
            .columns
            .iter()
            .map(|c| {
                let ty = row.and_then(|r| r.get(c)).map(json_type_name).unwrap_or("null");
                (c.clone(), ty.to_string())
            })
            .collect();
        Ok(DatasetSchema {
            dataset_id: ds.id.clone(),
            column_count: first.columns.len(),
            columns: first.columns,
            dtypes,
            row_count: None,
        })
    }
}

/// Header pass for the column names, then a full pass for row count and
/// per-column types.
fn local_schema(dataset_id: &str, path: &Path) -> anyhow::Result<DatasetSchema> {
    let header = {
        let file = std::fs::File::open(path)?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line)?;
        split_record(line.trim_end_matches(&['\r', '\n'][..]))
    };
    if header.is_empty() || header.iter().all(String::is_empty) {
        anyhow::bail!("{} has no header row", path.display());
    }
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, c)| if c.trim().is_empty() { format!("Unnamed: {i}") } else { c.clone() })
        .collect();

    let mut kinds = vec![CellKind::Int; columns.len()];
    let mut row_count = 0u64;
    let file = std::fs::File::open(path)?;
    for line in BufReader::new(file).lines().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        row_count += 1;
        let cells = split_record(&line);
        for (i, kind) in kinds.iter_mut().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            *kind = kind.widen(cell);
        }
    }

    // no data rows: nothing to infer from
    if row_count == 0 {
        kinds.iter_mut().for_each(|k| *k = CellKind::Object);
    }
    let dtypes: BTreeMap<String, String> =
        columns.iter().zip(&kinds).map(|(c, k)| (c.clone(), k.dtype().to_string())).collect();

    Ok(DatasetSchema {
        dataset_id: dataset_id.to_string(),
        column_count: columns.len(),
        columns,
        dtypes,
        row_count: Some(row_count),
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum CellKind {
    Int,
    Float,
    Object,
}

impl CellKind {
    /// Missing cells force a float column (NaN), text forces object.
    fn widen(self, cell: &str) -> CellKind {
        let cell = cell.trim();
        let missing = cell.is_empty() || cell == "NA" || cell == "NaN" || cell == "nan";
        match self {
            CellKind::Object => CellKind::Object,
            _ if missing => CellKind::Float,
            CellKind::Int if cell.parse::<i64>().is_ok() => CellKind::Int,
            _ if cell.parse::<f64>().is_ok() => CellKind::Float,
            _ => CellKind::Object,
        }
    }

    fn dtype(self) -> &'static str {
        match self {
            CellKind::Int => "int64",
            CellKind::Float => "float64",
            CellKind::Object => "object",
        }
    }
}
