#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metastore::InMemoryRepository;
use orchestrator::broker::TaskBroker;
use orchestrator::config::AppConfig;
use orchestrator::error::GrnError;
use orchestrator::hub::{HubClient, HubRows};
use orchestrator::state::{AppState, Stores};
use orchestrator::types_jobs::RunInferenceTask;
use serde_json::{Map, Value};
use tempfile::TempDir;

#[derive(Default)]
pub struct FakeHub {
    pub datasets: HashMap<String, HubRows>,
    pub sizes: HashMap<String, u64>,
}

impl FakeHub {
    pub fn with_dataset(mut self, repo_id: &str, rows: HubRows, size: u64) -> Self {
        self.datasets.insert(repo_id.to_string(), rows);
        self.sizes.insert(repo_id.to_string(), size);
        self
    }
}

#[async_trait]
impl HubClient for FakeHub {
    async fn exists(&self, repo_id: &str) -> anyhow::Result<bool> {
        Ok(self.datasets.contains_key(repo_id))
    }

    async fn size_bytes(&self, repo_id: &str) -> anyhow::Result<Option<u64>> {
        Ok(self.sizes.get(repo_id).copied())
    }

    async fn first_row(&self, repo_id: &str) -> anyhow::Result<HubRows> {
        let all = self.rows(repo_id).await?;
        Ok(HubRows { columns: all.columns, rows: all.rows.into_iter().take(1).collect() })
    }

    async fn rows(&self, repo_id: &str) -> anyhow::Result<HubRows> {
        self.datasets.get(repo_id).cloned().ok_or_else(|| anyhow::anyhow!("no such dataset {repo_id}"))
    }
}

/// Records every broker call; nothing is executed.
#[derive(Default)]
pub struct RecordingBroker {
    pub sent: Mutex<Vec<(String, RunInferenceTask)>>,
    pub revoked: Mutex<Vec<String>>,
    pub cancels: Mutex<Vec<String>>,
}

impl RecordingBroker {
    pub fn sent(&self) -> Vec<(String, RunInferenceTask)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskBroker for RecordingBroker {
    async fn send_task(&self, task: RunInferenceTask) -> Result<String, GrnError> {
        let mut sent = self.sent.lock().unwrap();
        let handle = format!("task-{}", sent.len() + 1);
        sent.push((handle.clone(), task));
        Ok(handle)
    }

    async fn send_cancel(&self, job_id: &str) -> Result<String, GrnError> {
        self.cancels.lock().unwrap().push(job_id.to_string());
        Ok(format!("cancel-{job_id}"))
    }

    async fn revoke(&self, handle: &str) {
        self.revoked.lock().unwrap().push(handle.to_string());
    }
}

pub fn test_config(root: &Path) -> AppConfig {
    let data = root.to_string_lossy().into_owned();
    let cfg = AppConfig::from_lookup(|k| match k {
        "GRN_DATA_DIR" => Some(data.clone()),
        "GRN_LOG_FORMAT" => Some("plain".to_string()),
        _ => None,
    })
    .unwrap();
    cfg.ensure_dirs().unwrap();
    cfg
}

pub fn in_memory_stores() -> Stores {
    Stores {
        datasets: Box::new(InMemoryRepository::new()),
        jobs: Box::new(InMemoryRepository::new()),
        results: Box::new(InMemoryRepository::new()),
    }
}

pub struct Harness {
    pub tmp: TempDir,
    pub state: Arc<AppState>,
    pub broker: Arc<RecordingBroker>,
}

pub fn harness_with_hub(hub: FakeHub) -> Harness {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path());
    let broker = Arc::new(RecordingBroker::default());
    let state = Arc::new(AppState::new(cfg, in_memory_stores(), Arc::new(hub), broker.clone()));
    Harness { tmp, state, broker }
}

pub fn harness() -> Harness {
    harness_with_hub(FakeHub::default())
}

/// `genes` x `samples` expression CSV with a `gene` index column.
pub fn write_expression_csv(dir: &Path, name: &str, genes: usize, samples: usize) -> PathBuf {
    let mut text = String::from("gene");
    for s in 0..samples {
        text.push_str(&format!(",S{s}"));
    }
    text.push('\n');
    for g in 0..genes {
        text.push_str(&format!("G{g}"));
        for s in 0..samples {
            text.push_str(&format!(",{}.25", (g + s) % 17));
        }
        text.push('\n');
    }
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

pub fn hub_rows(genes: usize) -> HubRows {
    let columns = vec!["gene".to_string(), "s1".to_string(), "s2".to_string()];
    let rows = (0..genes)
        .map(|g| {
            let mut m = Map::new();
            m.insert("gene".into(), Value::from(format!("G{g}")));
            m.insert("s1".into(), Value::from(g as f64 + 0.5));
            m.insert("s2".into(), Value::from(g as i64));
            m
        })
        .collect();
    HubRows { columns, rows }
}
