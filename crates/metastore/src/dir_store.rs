//! One JSON document per record, `<dir>/<id>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::{Record, Repository};
use crate::{MetaStoreError, Result};

pub struct JsonDirStore<T> {
    dir: PathBuf,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Record> JsonDirStore<T> {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| MetaStoreError::io(&dir, e))?;
        Ok(Self { dir, _marker: std::marker::PhantomData })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, id: &str) -> Result<PathBuf> {
        // the id becomes a filename stem; anything that could escape `dir` is refused
        if id.is_empty() || id.contains(&['/', '\\'][..]) || id.starts_with('.') {
            return Err(MetaStoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Record files sorted by filename.
    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| MetaStoreError::io(&self.dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MetaStoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read(path: &Path) -> Result<T> {
        let bytes = fs::read(path).map_err(|e| MetaStoreError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| MetaStoreError::ser(path, e))
    }
}

impl<T: Record> Repository<T> for JsonDirStore<T> {
    fn get(&self, id: &str) -> Result<Option<T>> {
        let path = match self.file_for(id) {
            Ok(p) => p,
            Err(MetaStoreError::InvalidId(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    fn list(&self) -> Result<Vec<T>> {
        self.record_files()?.iter().map(|p| Self::read(p)).collect()
    }

    fn put(&mut self, record: &T) -> Result<()> {
        let path = self.file_for(record.record_id())?;
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| MetaStoreError::ser(&path, e))?;
        fs::write(&path, bytes).map_err(|e| MetaStoreError::io(&path, e))
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let path = match self.file_for(id) {
            Ok(p) => p,
            Err(MetaStoreError::InvalidId(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| MetaStoreError::io(&path, e))?;
        Ok(true)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.record_files()?.len())
    }
}
