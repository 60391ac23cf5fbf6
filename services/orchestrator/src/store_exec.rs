use std::sync::Arc;

use metastore::{Record, Repository};
use tokio::sync::RwLock;

use crate::error::GrnError;

/// Shared handle to one entity collection.
pub type SharedRepo<T> = Arc<RwLock<Box<dyn Repository<T>>>>;

pub fn shared<T: Record>(repo: Box<dyn Repository<T>>) -> SharedRepo<T> {
    Arc::new(RwLock::new(repo))
}

/// Runs `f` against the repository on the blocking pool. The write guard is
/// held for the whole closure, so read-modify-write sequences inside one call
/// don't interleave with other writers in this process.
pub async fn with_store_blocking<T, R, F>(store: SharedRepo<T>, f: F) -> Result<R, GrnError>
where
    T: Record,
    R: Send + 'static,
    F: FnOnce(&mut dyn Repository<T>) -> Result<R, GrnError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = store.blocking_write();
        f(&mut **guard)
    })
    .await?
}
