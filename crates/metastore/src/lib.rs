//! Flat-file metadata store
//!
//! Record persistence behind a small repository interface. Backends keep no
//! locks of their own: callers serialise writers (see `with_store_blocking`
//! in the orchestrator) and concurrent processes writing the same collection
//! race, last writer wins.

mod collection;
mod dir_store;
mod storage;

pub use collection::JsonCollectionFile;
pub use dir_store::JsonDirStore;
pub use storage::{InMemoryRepository, Record, Repository};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetaStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error in {path}: {message}")]
    Serialization { path: PathBuf, message: String },

    #[error("Invalid record id: {0:?}")]
    InvalidId(String),
}

impl MetaStoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MetaStoreError::Io { path: path.into(), source }
    }

    pub(crate) fn ser(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        MetaStoreError::Serialization { path: path.into(), message: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, MetaStoreError>;

/// Slice `items` the way `skip`/`limit` pagination expects: out-of-range
/// offsets yield fewer (or zero) items, never an error.
pub fn paginate<T>(items: Vec<T>, skip: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(skip).take(limit).collect()
}
