use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use grnops::runner::{ADJACENCY_FILE, MOCK_NOTE};
use grnops::{
    run_pipeline, run_pipeline_until, ExpressionMatrix, GrnOpsError, GrnRunner, MockRunner, Params, RunStatus,
    RunnerRegistry, StepLog, METADATA_FILE, STOPPED_MESSAGE,
};
use serde_json::Value;
use tempfile::TempDir;

fn expression(genes: usize, samples: usize) -> ExpressionMatrix {
    let mut text = String::from("gene");
    for s in 0..samples {
        text.push_str(&format!(",sample_{s}"));
    }
    text.push('\n');
    for g in 0..genes {
        text.push_str(&format!("GENE{g}"));
        for s in 0..samples {
            text.push_str(&format!(",{}", (g * samples + s) as f64 * 0.5));
        }
        text.push('\n');
    }
    ExpressionMatrix::from_csv_str(&text).unwrap()
}

fn registry() -> RunnerRegistry {
    let algs: Vec<String> = ["GRNBoost2", "CLR"].iter().map(|s| s.to_string()).collect();
    RunnerRegistry::with_defaults(&algs, &HashMap::new())
}

#[test]
fn test_mock_run_writes_outputs_and_metadata() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("job_abc");
    let log = StepLog::for_job("job_abc", &out);

    let payload = run_pipeline(&registry(), &expression(100, 50), "GRNBoost2", &Params::new(), &out, &log).unwrap();

    assert_eq!(payload.status, RunStatus::Completed);
    assert!(payload.mock);
    assert_eq!(payload.note.as_deref(), Some(MOCK_NOTE));
    assert_eq!(payload.genes, 100);
    assert_eq!(payload.samples, 50);
    assert!(payload.edges_count > 300 && payload.edges_count < 700, "edges {}", payload.edges_count);
    assert!(payload.min_weight > 0.0 && payload.max_weight <= 0.05);
    assert!(out.join(ADJACENCY_FILE).exists());
    assert!(out.join("logs.txt").exists());

    let meta: Value = serde_json::from_slice(&fs::read(out.join(METADATA_FILE)).unwrap()).unwrap();
    assert_eq!(meta["status"], "completed");
    assert_eq!(meta["edges_count"], payload.edges_count);
    assert_eq!(meta["algorithm"], "GRNBoost2");
}

#[test]
fn test_same_input_same_bytes() {
    let tmp = TempDir::new().unwrap();
    let data = expression(30, 10);
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    let log = StepLog::detached();

    let pa = run_pipeline(&registry(), &data, "CLR", &Params::new(), &a, &log).unwrap();
    let pb = run_pipeline(&registry(), &data, "CLR", &Params::new(), &b, &log).unwrap();

    assert_eq!(fs::read(a.join(ADJACENCY_FILE)).unwrap(), fs::read(b.join(ADJACENCY_FILE)).unwrap());
    assert_eq!(pa.adjacency_digest, pb.adjacency_digest);
    assert_eq!(pa.edges_count, pb.edges_count);
}

#[test]
fn test_unknown_algorithm_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("job_x");
    let err = run_pipeline(&registry(), &expression(5, 3), "Foo", &Params::new(), &out, &StepLog::detached())
        .unwrap_err();

    assert!(matches!(err, GrnOpsError::UnsupportedAlgorithm { .. }));
    assert!(err.to_string().starts_with("Algorithm 'Foo' not supported"));
    assert!(!out.join(METADATA_FILE).exists());
}

struct Exploding;

impl GrnRunner for Exploding {
    fn algorithm(&self) -> &str {
        "Exploding"
    }

    fn execute(&self, _ctx: &grnops::RunContext<'_>) -> grnops::Result<grnops::RunOutcome> {
        Err(GrnOpsError::Execution("boom".into()))
    }
}

#[test]
fn test_runner_failure_records_failed_metadata() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("job_y");
    let mut reg = RunnerRegistry::new();
    reg.register(Arc::new(Exploding));
    reg.register(Arc::new(MockRunner::new("Mocky")));

    let err = run_pipeline(&reg, &expression(5, 3), "Exploding", &Params::new(), &out, &StepLog::detached())
        .unwrap_err();
    assert_eq!(err.to_string(), "boom");

    let meta: Value = serde_json::from_slice(&fs::read(out.join(METADATA_FILE)).unwrap()).unwrap();
    assert_eq!(meta["status"], "failed");
    assert_eq!(meta["error"], "boom");
    assert_eq!(meta["algorithm"], "Exploding");
    assert_eq!(reg.algorithms(), ["Exploding".to_string(), "Mocky".to_string()]);
}

#[test]
fn test_seed_param_changes_network() {
    let tmp = TempDir::new().unwrap();
    let data = expression(40, 5);
    let log = StepLog::detached();
    let mut seeded = Params::new();
    seeded.insert("seed".into(), Value::from(7));

    let a = run_pipeline(&registry(), &data, "CLR", &Params::new(), &tmp.path().join("a"), &log).unwrap();
    let b = run_pipeline(&registry(), &data, "CLR", &seeded, &tmp.path().join("b"), &log).unwrap();
    assert_ne!(a.adjacency_digest, b.adjacency_digest);
}

#[test]
fn test_stopped_run_is_recorded_as_failed() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("job_z");

    let err = run_pipeline_until(
        &registry(),
        &expression(10, 4),
        "CLR",
        &Params::new(),
        &out,
        &StepLog::detached(),
        &|| true,
    )
    .unwrap_err();
    assert_eq!(err.to_string(), STOPPED_MESSAGE);

    let meta: Value = serde_json::from_slice(&fs::read(out.join(METADATA_FILE)).unwrap()).unwrap();
    assert_eq!(meta["status"], "failed");
    assert_eq!(meta["error"], STOPPED_MESSAGE);
}
