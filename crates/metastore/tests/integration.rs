use metastore::{paginate, InMemoryRepository, JsonCollectionFile, JsonDirStore, Record, Repository};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Item {
    id: String,
    name: String,
}

impl Record for Item {
    fn record_id(&self) -> &str {
        &self.id
    }
}

fn item(id: &str, name: &str) -> Item {
    Item { id: id.to_string(), name: name.to_string() }
}

#[test]
fn test_in_memory_put_get_delete() {
    let mut repo = InMemoryRepository::new();
    repo.put(&item("a", "first")).unwrap();
    repo.put(&item("b", "second")).unwrap();

    assert_eq!(repo.get("a").unwrap(), Some(item("a", "first")));
    assert_eq!(repo.count().unwrap(), 2);

    assert!(repo.delete("a").unwrap());
    assert!(!repo.delete("a").unwrap());
    assert_eq!(repo.get("a").unwrap(), None);
}

#[test]
fn test_collection_preserves_insertion_order_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("datasets_metadata.json");

    {
        let mut repo = JsonCollectionFile::open(&path).unwrap();
        // ids deliberately out of lexical order
        repo.put(&item("zeta", "1")).unwrap();
        repo.put(&item("alpha", "2")).unwrap();
        repo.put(&item("mid", "3")).unwrap();
    }

    let repo: JsonCollectionFile<Item> = JsonCollectionFile::open(&path).unwrap();
    let ids: Vec<String> = repo.list().unwrap().into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_collection_overwrite_keeps_position() {
    let dir = TempDir::new().unwrap();
    let mut repo = JsonCollectionFile::open(dir.path().join("c.json")).unwrap();
    repo.put(&item("a", "old")).unwrap();
    repo.put(&item("b", "x")).unwrap();
    repo.put(&item("a", "new")).unwrap();

    let all = repo.list().unwrap();
    assert_eq!(all, vec![item("a", "new"), item("b", "x")]);
}

#[test]
fn test_collection_document_is_id_keyed_map() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("results_metadata.json");
    let mut repo = JsonCollectionFile::open(&path).unwrap();
    repo.put(&item("r1", "one")).unwrap();

    let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["r1"]["name"], "one");
}

#[test]
fn test_collection_delete_rewrites_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("c.json");
    {
        let mut repo = JsonCollectionFile::open(&path).unwrap();
        repo.put(&item("a", "1")).unwrap();
        repo.put(&item("b", "2")).unwrap();
        assert!(repo.delete("a").unwrap());
    }
    let repo: JsonCollectionFile<Item> = JsonCollectionFile::open(&path).unwrap();
    assert_eq!(repo.count().unwrap(), 1);
    assert!(repo.get("a").unwrap().is_none());
}

#[test]
fn test_dir_store_one_file_per_record() {
    let dir = TempDir::new().unwrap();
    let jobs_dir = dir.path().join("jobs");
    let mut repo = JsonDirStore::open(&jobs_dir).unwrap();
    repo.put(&item("job_1", "a")).unwrap();
    repo.put(&item("job_2", "b")).unwrap();

    assert!(jobs_dir.join("job_1.json").exists());
    assert!(jobs_dir.join("job_2.json").exists());
    assert_eq!(repo.count().unwrap(), 2);
    assert_eq!(repo.get("job_2").unwrap(), Some(item("job_2", "b")));

    assert!(repo.delete("job_1").unwrap());
    assert!(!jobs_dir.join("job_1.json").exists());
}

#[test]
fn test_dir_store_rejects_path_like_ids() {
    let dir = TempDir::new().unwrap();
    let mut repo: JsonDirStore<Item> = JsonDirStore::open(dir.path()).unwrap();

    assert!(repo.put(&item("../escape", "x")).is_err());
    assert_eq!(repo.get("../escape").unwrap(), None);
    assert!(!repo.delete("a/b").unwrap());
}

#[test]
fn test_paginate_out_of_range() {
    let items: Vec<u32> = (0..5).collect();
    assert_eq!(paginate(items.clone(), 3, 10), vec![3, 4]);
    assert!(paginate(items.clone(), 50, 10).is_empty());
    assert_eq!(paginate(items, 0, 2), vec![0, 1]);
}

#[test]
fn test_collection_failed_put_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"x").unwrap();

    let mut repo = JsonCollectionFile::<Item>::open(blocker.join("datasets_metadata.json")).unwrap();
    assert!(repo.put(&item("a", "first")).is_err());

    assert_eq!(repo.get("a").unwrap(), None);
    assert_eq!(repo.count().unwrap(), 0);
    assert!(repo.list().unwrap().is_empty());
}

#[test]
fn test_collection_failed_write_keeps_previous_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("results_metadata.json");

    let mut repo = JsonCollectionFile::open(&path).unwrap();
    repo.put(&item("a", "first")).unwrap();

    // A directory squatting on the temp path makes every later save fail.
    std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

    assert!(repo.put(&item("a", "renamed")).is_err());
    assert!(repo.put(&item("b", "second")).is_err());
    assert!(repo.delete("a").is_err());

    assert_eq!(repo.list().unwrap(), vec![item("a", "first")]);

    let reopened = JsonCollectionFile::<Item>::open(&path).unwrap();
    assert_eq!(reopened.list().unwrap(), repo.list().unwrap());
}
