mod common;

use common::{harness, harness_with_hub, hub_rows, write_expression_csv, FakeHub};
use orchestrator::error::GrnError;
use orchestrator::types::Page;
use orchestrator::types_datasets::{DatasetCreate, DatasetType, DatasetUpdate};
use orchestrator::types_results::{ResultFilter, ResultSummary};
use serde_json::{json, Map};

fn create(name: &str, file_path: &str) -> DatasetCreate {
    DatasetCreate {
        name: name.to_string(),
        description: None,
        dataset_type: DatasetType::Expression,
        file_path: file_path.to_string(),
        genes: None,
        samples: None,
        metadata: Map::new(),
    }
}

fn summary(edges: u64) -> ResultSummary {
    ResultSummary {
        edges_count: edges,
        mean_weight: 0.02,
        max_weight: 0.05,
        min_weight: 0.001,
        mock: true,
        note: None,
        execution_time_seconds: 0.1,
        adjacency_digest: None,
    }
}

const ALL: Page = Page { skip: 0, limit: 100 };

#[tokio::test]
async fn test_register_local_records_size() {
    let h = harness();
    let path = write_expression_csv(h.tmp.path(), "expr.csv", 10, 4);

    let ds = h.state.datasets.register(create("D", path.to_str().unwrap())).await.unwrap();
    assert!(ds.id.starts_with("dataset_"));
    assert!(!ds.is_hf_dataset);
    assert_eq!(ds.size_bytes, Some(std::fs::metadata(&path).unwrap().len()));
    assert_eq!(h.state.datasets.get(&ds.id).await.unwrap(), Some(ds));
}

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let h = harness();
    let a = write_expression_csv(h.tmp.path(), "a.csv", 3, 2);
    let b = write_expression_csv(h.tmp.path(), "b.csv", 5, 5);

    h.state.datasets.register(create("same", a.to_str().unwrap())).await.unwrap();
    let mut other = create("same", b.to_str().unwrap());
    other.dataset_type = DatasetType::Benchmark;
    let err = h.state.datasets.register(other).await.unwrap_err();

    assert!(matches!(err, GrnError::DuplicateName(ref n) if n == "same"));
    assert_eq!(h.state.datasets.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_missing_local_file_creates_nothing() {
    let h = harness();
    let missing = h.tmp.path().join("nope.csv");
    let err = h.state.datasets.register(create("D", missing.to_str().unwrap())).await.unwrap_err();

    assert!(matches!(err, GrnError::LocalFileNotFound(_)));
    assert_eq!(h.state.datasets.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_name_is_validation_error() {
    let h = harness();
    let err = h.state.datasets.register(create("  ", "/tmp/x.csv")).await.unwrap_err();
    assert!(matches!(err, GrnError::Validation(_)));
}

#[tokio::test]
async fn test_hub_dataset_registration() {
    let h = harness_with_hub(FakeHub::default().with_dataset("lab/atlas", hub_rows(5), 2048));

    let ds = h.state.datasets.register(create("atlas", "lab/atlas")).await.unwrap();
    assert!(ds.is_hf_dataset);
    assert_eq!(ds.size_bytes, Some(2048));

    let err = h.state.datasets.register(create("other", "lab/missing")).await.unwrap_err();
    assert!(matches!(err, GrnError::RemoteDatasetNotFound(_)));

    let schema = h.state.datasets.schema(&ds.id).await.unwrap().unwrap();
    assert_eq!(schema.columns, vec!["gene", "s1", "s2"]);
    assert_eq!(schema.row_count, None);
    assert_eq!(schema.dtypes["gene"], "string");
    assert_eq!(schema.dtypes["s1"], "float");
    assert_eq!(schema.dtypes["s2"], "integer");
}

#[tokio::test]
async fn test_list_order_and_out_of_range_pages() {
    let h = harness();
    let path = write_expression_csv(h.tmp.path(), "e.csv", 2, 2);
    for name in ["a", "b", "c"] {
        h.state.datasets.register(create(name, path.to_str().unwrap())).await.unwrap();
    }

    let names: Vec<String> = h.state.datasets.list(ALL).await.unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(h.state.datasets.count().await.unwrap(), 3);

    let page = h.state.datasets.list(Page { skip: 2, limit: 10 }).await.unwrap();
    assert_eq!(page.len(), 1);
    assert!(h.state.datasets.list(Page { skip: 50, limit: 10 }).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_local_schema_shape() {
    let h = harness();
    // index column + 49 samples = 50 columns, 100 data rows
    let path = write_expression_csv(h.tmp.path(), "wide.csv", 100, 49);
    let ds = h.state.datasets.register(create("wide", path.to_str().unwrap())).await.unwrap();

    let schema = h.state.datasets.schema(&ds.id).await.unwrap().unwrap();
    assert_eq!(schema.column_count, 50);
    assert_eq!(schema.columns.len(), 50);
    assert_eq!(schema.row_count, Some(100));
    assert_eq!(schema.dtypes["gene"], "object");
    assert_eq!(schema.dtypes["S0"], "float64");
}

#[tokio::test]
async fn test_schema_read_failure_is_none() {
    let h = harness();
    let path = write_expression_csv(h.tmp.path(), "gone.csv", 3, 3);
    let ds = h.state.datasets.register(create("gone", path.to_str().unwrap())).await.unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(h.state.datasets.schema(&ds.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_update_metadata_merges() {
    let h = harness();
    let path = write_expression_csv(h.tmp.path(), "m.csv", 2, 2);
    let mut req = create("m", path.to_str().unwrap());
    req.metadata = json!({"organism": "mouse"}).as_object().unwrap().clone();
    let ds = h.state.datasets.register(req).await.unwrap();

    let patch = DatasetUpdate {
        description: Some("liver".into()),
        metadata: json!({"tissue": "liver"}).as_object().unwrap().clone(),
    };
    let updated = h.state.datasets.update_metadata(&ds.id, patch).await.unwrap().unwrap();
    assert_eq!(updated.metadata["organism"], "mouse");
    assert_eq!(updated.metadata["tissue"], "liver");
    assert_eq!(updated.description.as_deref(), Some("liver"));
    assert!(updated.updated_at >= ds.updated_at);

    assert!(h.state.datasets.update_metadata("dataset_nope", DatasetUpdate::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_results_filter_and_newest_first() {
    let h = harness();
    let r1 = h.state.results.create("job_1", "dataset_a", "CLR", summary(10)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let r2 = h.state.results.create("job_2", "dataset_a", "GRNBoost2", summary(20)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let r3 = h.state.results.create("job_3", "dataset_b", "CLR", summary(30)).await.unwrap();

    let ids: Vec<String> =
        h.state.results.list(ResultFilter::default(), ALL).await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![r3.id.clone(), r2.id.clone(), r1.id.clone()]);

    let by_ds = ResultFilter { dataset_id: Some("dataset_a".into()), algorithm: None };
    assert_eq!(h.state.results.count(by_ds).await.unwrap(), 2);
    let by_alg = ResultFilter { dataset_id: None, algorithm: Some("CLR".into()) };
    let clr: Vec<String> = h.state.results.list(by_alg, ALL).await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(clr, vec![r3.id.clone(), r1.id.clone()]);

    assert_eq!(h.state.results.get_by_job("job_2").await.unwrap().map(|r| r.id), Some(r2.id.clone()));
    assert!(h.state.results.delete(&r2.id).await.unwrap());
    assert!(!h.state.results.delete(&r2.id).await.unwrap());
    assert!(h.state.results.get_by_job("job_2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_result_files_and_safe_download() {
    let h = harness();
    let r = h.state.results.create("job_files", "dataset_a", "CLR", summary(1)).await.unwrap();
    assert!(h.state.results.list_files(&r.id).await.unwrap().is_empty());

    let dir = h.state.config.results_dir.join("job_files");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("adjacency_matrix.csv"), "x").unwrap();
    std::fs::write(dir.join("metadata.json"), "{}").unwrap();
    std::fs::write(h.state.config.results_dir.join("secret.txt"), "s").unwrap();

    let files: Vec<String> = h.state.results.list_files(&r.id).await.unwrap().into_iter().map(|f| f.filename).collect();
    assert_eq!(files, vec!["adjacency_matrix.csv", "metadata.json"]);

    let path = h.state.results.get_file(&r.id, "adjacency_matrix.csv").await.unwrap().unwrap();
    assert!(path.ends_with("adjacency_matrix.csv"));
    assert!(h.state.results.get_file(&r.id, "absent.csv").await.unwrap().is_none());
    assert!(matches!(h.state.results.get_file(&r.id, "../secret.txt").await, Err(GrnError::Validation(_))));
    assert!(matches!(h.state.results.get_file(&r.id, "..").await, Err(GrnError::Validation(_))));
    assert!(h.state.results.list_files("result_unknown").await.unwrap().is_empty());

    let updated = h.state.results.update(&r.id, vec!["adjacency_matrix.csv".into()], Some(1)).await.unwrap().unwrap();
    assert_eq!(updated.output_files, vec!["adjacency_matrix.csv"]);
    assert_eq!(updated.size_bytes, Some(1));
}
