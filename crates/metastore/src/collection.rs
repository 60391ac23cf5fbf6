//! Whole-collection JSON file: one document mapping id -> record.
//!
//! The file is read once when the store is opened and kept in memory; every
//! mutation rewrites the entire document.

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::storage::{Record, Repository};
use crate::{MetaStoreError, Result};

pub struct JsonCollectionFile<T> {
    path: PathBuf,
    records: Vec<T>,
}

impl<T: Record> JsonCollectionFile<T> {
    /// Opens (or lazily creates) the collection at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| MetaStoreError::io(&path, e))?;
            if bytes.iter().all(|b| b.is_ascii_whitespace()) {
                Vec::new()
            } else {
                let doc: OrderedRecords<T> =
                    serde_json::from_slice(&bytes).map_err(|e| MetaStoreError::ser(&path, e))?;
                doc.0
            }
        } else {
            Vec::new()
        };
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persists `records`; the in-memory state is only replaced after this succeeds.
    fn save(&self, records: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| MetaStoreError::io(parent, e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let file = fs::File::create(&tmp).map_err(|e| MetaStoreError::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &RecordsRef(records))
            .map_err(|e| MetaStoreError::ser(&tmp, e))?;
        writer.flush().map_err(|e| MetaStoreError::io(&tmp, e))?;
        drop(writer);

        fs::rename(&tmp, &self.path).map_err(|e| MetaStoreError::io(&self.path, e))
    }
}

impl<T: Record> Repository<T> for JsonCollectionFile<T> {
    fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.records.iter().find(|r| r.record_id() == id).cloned())
    }

    fn list(&self) -> Result<Vec<T>> {
        Ok(self.records.clone())
    }

    fn put(&mut self, record: &T) -> Result<()> {
        let mut next = self.records.clone();
        match next.iter_mut().find(|r| r.record_id() == record.record_id()) {
            Some(slot) => *slot = record.clone(),
            None => next.push(record.clone()),
        }
        self.save(&next)?;
        self.records = next;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let next: Vec<T> = self.records.iter().filter(|r| r.record_id() != id).cloned().collect();
        if next.len() == self.records.len() {
            return Ok(false);
        }
        self.save(&next)?;
        self.records = next;
        Ok(true)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }
}

// serde_json's default map type sorts keys; these wrappers keep the
// document in insertion order.
struct RecordsRef<'a, T>(&'a [T]);

impl<T: Record> Serialize for RecordsRef<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|r| (r.record_id(), r)))
    }
}

struct OrderedRecords<T>(Vec<T>);

impl<'de, T: Record> Deserialize<'de> for OrderedRecords<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RecordsVisitor<T>(PhantomData<T>);

        impl<'de, T: Record> Visitor<'de> for RecordsVisitor<T> {
            type Value = OrderedRecords<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of id to record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((_id, rec)) = map.next_entry::<String, T>()? {
                    out.push(rec);
                }
                Ok(OrderedRecords(out))
            }
        }

        deserializer.deserialize_map(RecordsVisitor(PhantomData))
    }
}
