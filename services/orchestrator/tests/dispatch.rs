mod common;

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{write_expression_csv, FakeHub};
use grnops::{EdgeStats, GrnRunner, Params, RunContext, RunOutcome, RunnerRegistry, METADATA_FILE, STOPPED_MESSAGE};
use orchestrator::dispatch::Dispatcher;
use serde_json::Value;
use tempfile::TempDir;

/// Blocks inside `execute` until released, like a long external tool run.
struct Gated {
    started: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GrnRunner for Gated {
    fn algorithm(&self) -> &str {
        "Gated"
    }

    fn execute(&self, _ctx: &RunContext<'_>) -> grnops::Result<RunOutcome> {
        self.started.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok(RunOutcome {
            stats: EdgeStats::default(),
            output_files: Vec::new(),
            mock: false,
            note: None,
            adjacency_digest: None,
        })
    }
}

#[tokio::test]
async fn test_dropped_run_never_records_completion() {
    let tmp = TempDir::new().unwrap();
    let csv = write_expression_csv(tmp.path(), "expr.csv", 6, 3);
    let results_dir = tmp.path().join("results");

    let (started_tx, started_rx) = channel();
    let (release_tx, release_rx) = channel();
    let mut registry = RunnerRegistry::new();
    registry.register(Arc::new(Gated { started: Mutex::new(started_tx), release: Mutex::new(release_rx) }));
    let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(FakeHub::default()), results_dir.clone());

    let csv_path = csv.display().to_string();
    let run = tokio::spawn(async move { dispatcher.run("job_gated", &csv_path, "Gated", &Params::new()).await });

    tokio::task::spawn_blocking(move || started_rx.recv()).await.unwrap().unwrap();
    // Same as a hard timeout or revoke: the worker drops the future mid-run.
    run.abort();
    assert!(run.await.unwrap_err().is_cancelled());
    release_tx.send(()).unwrap();

    let metadata = results_dir.join("job_gated").join(METADATA_FILE);
    let mut meta = None;
    for _ in 0..200 {
        if let Ok(bytes) = std::fs::read(&metadata) {
            if let Ok(v) = serde_json::from_slice::<Value>(&bytes) {
                meta = Some(v);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let meta = meta.expect("metadata.json written by the abandoned run");
    assert_eq!(meta["status"], "failed");
    assert_eq!(meta["error"], STOPPED_MESSAGE);
}
