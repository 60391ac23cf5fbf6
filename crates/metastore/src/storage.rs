//! Repository trait and the in-memory implementation

use serde::{de::DeserializeOwned, Serialize};

use crate::Result;

/// A persisted entity addressed by a string id.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn record_id(&self) -> &str;
}

/// Minimal CRUD surface shared by every backend.
///
/// `list` returns records in the backend's storage order. Swapping the
/// whole-file backends for a transactional store must not change this
/// interface.
pub trait Repository<T: Record>: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<T>>;
    fn list(&self) -> Result<Vec<T>>;
    fn put(&mut self, record: &T) -> Result<()>;
    fn delete(&mut self, id: &str) -> Result<bool>;

    fn count(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }
}

/// In-memory repository (for testing), insertion ordered.
#[derive(Clone)]
pub struct InMemoryRepository<T> {
    records: Vec<T>,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Repository<T> for InMemoryRepository<T> {
    fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.records.iter().find(|r| r.record_id() == id).cloned())
    }

    fn list(&self) -> Result<Vec<T>> {
        Ok(self.records.clone())
    }

    fn put(&mut self, record: &T) -> Result<()> {
        match self.records.iter_mut().find(|r| r.record_id() == record.record_id()) {
            Some(slot) => *slot = record.clone(),
            None => self.records.push(record.clone()),
        }
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let before = self.records.len();
        self.records.retain(|r| r.record_id() != id);
        Ok(self.records.len() != before)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }
}
