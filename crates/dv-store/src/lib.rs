use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dv_config::{CacheBackend, CacheConfig};
use thiserror::Error;

mod memory;
mod sqlite;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to lock cache connection: {0}")]
    LockPoisoned(String),
    #[error("cache task failed: {0}")]
    Task(String),
}

/// Key/value cache with store-owned expiry. Callers never pass a TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn backend_name(&self) -> &str;
}

/// Opens the configured backend; `None` when caching is disabled.
pub fn open_cache_store(
    workspace_root: impl AsRef<Path>,
    config: &CacheConfig,
) -> Result<Option<Arc<dyn CacheStore>>, StoreError> {
    let ttl = Duration::from_secs(config.ttl_secs);
    let store: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::Disabled => return Ok(None),
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new(ttl)),
        CacheBackend::Sqlite => {
            let path = workspace_root.as_ref().join(&config.sqlite_path);
            Arc::new(SqliteCacheStore::open(path, ttl)?)
        }
    };
    tracing::debug!(backend = store.backend_name(), ttl_secs = config.ttl_secs, "opened cache store");
    Ok(Some(store))
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis() as i64)
        .unwrap_or(0)
}
