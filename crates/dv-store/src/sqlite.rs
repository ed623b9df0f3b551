use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{CacheStore, StoreError, now_millis};

pub const SQLITE_BACKEND_NAME: &str = "sqlite";

pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    ttl: Duration,
}

impl SqliteCacheStore {
    pub fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            ttl,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops expired rows; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let conn = lock(&self.conn)?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![now_millis()],
        )?;
        Ok(removed)
    }

    /// Runs `work` against the connection on the blocking pool.
    async fn with_connection<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            work(&guard)
        })
        .await
        .map_err(|err| StoreError::Task(format!("sqlite cache task failed: {err}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock().map_err(|err| StoreError::LockPoisoned(err.to_string()))
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_owned();
        self.with_connection(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                    params![key, now_millis()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = key.to_owned();
        let value = value.to_owned();
        let now = now_millis();
        let expires_at = now.saturating_add(self.ttl.as_millis() as i64);
        self.with_connection(move |conn| {
            conn.execute(
                r#"
                INSERT INTO cache_entries (key, value, stored_at, expires_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    stored_at = excluded.stored_at,
                    expires_at = excluded.expires_at
                "#,
                params![key, value, now, expires_at],
            )?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &str {
        SQLITE_BACKEND_NAME
    }
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            stored_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at
            ON cache_entries (expires_at);
        "#,
    )?;

    Ok(())
}
