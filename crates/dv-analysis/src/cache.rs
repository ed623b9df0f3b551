use std::future::Future;
use std::sync::Arc;

use dv_store::CacheStore;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{AnalysisError, TrackFilter};

pub const CACHE_KEY_PREFIX: &str = "dv:v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsOperation {
    DelegatesWithStats,
    Influence,
    VotingMatrix,
}

impl AnalyticsOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DelegatesWithStats => "delegates_with_stats",
            Self::Influence => "influence",
            Self::VotingMatrix => "voting_matrix",
        }
    }
}

/// `dv:v1:{operation}:{network}:{cohort}:{track_digest}`
pub fn cache_key(
    operation: AnalyticsOperation,
    network: &str,
    cohort_index: u32,
    tracks: &TrackFilter,
) -> String {
    format!(
        "{CACHE_KEY_PREFIX}:{}:{}:{cohort_index}:{}",
        operation.as_str(),
        dv_core::normalize_network(network),
        tracks.digest()
    )
}

/// Read-through JSON cache over an optional store. Store failures and
/// undecodable entries behave like misses.
#[derive(Clone, Default)]
pub struct AnalyticsCache {
    store: Option<Arc<dyn CacheStore>>,
}

impl AnalyticsCache {
    pub fn new(store: Option<Arc<dyn CacheStore>>) -> Self {
        Self { store }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, compute: F) -> Result<T, AnalysisError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AnalysisError>>,
    {
        let Some(store) = self.store.as_ref() else {
            return compute().await;
        };

        if let Some(cached) = lookup::<T>(store.as_ref(), key).await {
            tracing::debug!(key, "analytics cache hit");
            return Ok(cached);
        }

        let value = compute().await?;
        match serde_json::to_string(&value) {
            Ok(encoded) => {
                if let Err(err) = store.set(key, &encoded).await {
                    tracing::warn!(key, error = %err, "failed to write analytics cache entry");
                }
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to encode analytics cache entry");
            }
        }
        Ok(value)
    }
}

async fn lookup<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(key, error = %err, "analytics cache read failed; recomputing");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, error = %err, "undecodable analytics cache entry; recomputing");
            None
        }
    }
}
