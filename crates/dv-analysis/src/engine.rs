use std::path::Path;
use std::sync::Arc;

use dv_config::{
    CohortRegistry, DvConfig, load_cohort_registry, load_workspace_config, validate_config,
};
use dv_core::Cohort;
use dv_source::{GovernanceSource, IndexerClient};
use dv_store::{CacheStore, open_cache_store};

use crate::cache::{AnalyticsCache, AnalyticsOperation, cache_key};
use crate::influence::{InfluenceReport, analyze_cohort_influence};
use crate::matrix::{VotingMatrix, build_voting_matrix};
use crate::resolver::{ResolvedReferenda, resolve_cohort_referenda};
use crate::vote_stats::{DelegatesReport, cohort_delegate_stats};
use crate::{AnalysisError, AnalysisSettings, TrackFilter};

/// Entry point for cohort analytics. Every operation is read-through
/// cached and resolves the cohort's referenda on a miss.
#[derive(Clone)]
pub struct DvAnalyticsEngine {
    source: Arc<dyn GovernanceSource>,
    cache: AnalyticsCache,
    settings: AnalysisSettings,
    cohorts: Arc<CohortRegistry>,
}

impl DvAnalyticsEngine {
    pub fn new(
        source: Arc<dyn GovernanceSource>,
        cache_store: Option<Arc<dyn CacheStore>>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            source,
            cache: AnalyticsCache::new(cache_store),
            settings,
            cohorts: Arc::new(CohortRegistry::default()),
        }
    }

    pub fn with_cohorts(mut self, cohorts: CohortRegistry) -> Self {
        self.cohorts = Arc::new(cohorts);
        self
    }

    /// Indexer-backed engine with the configured cache backend and the
    /// cohort registry at `[cohorts] path`, relative to `workspace_root`.
    pub fn from_config(
        workspace_root: impl AsRef<Path>,
        config: &DvConfig,
    ) -> Result<Self, AnalysisError> {
        let workspace_root = workspace_root.as_ref();
        let source = IndexerClient::from_config(&config.source)?;
        let cache_store = open_cache_store(workspace_root, &config.cache)?;
        let cohorts = load_cohort_registry(workspace_root.join(&config.cohorts.path))?;
        tracing::debug!(cohorts = cohorts.len(), "loaded cohort registry");
        Ok(Self::new(
            Arc::new(source),
            cache_store,
            AnalysisSettings::from(config),
        )
        .with_cohorts(cohorts))
    }

    /// Loads `.dv/config.toml` under `workspace_root` (defaults when absent)
    /// and logs any validation warnings.
    pub fn open_workspace(workspace_root: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let workspace_root = workspace_root.as_ref();
        let config = load_workspace_config(workspace_root)?;
        for warning in validate_config(&config) {
            tracing::warn!(code = warning.code, "{}", warning.message);
        }
        Self::from_config(workspace_root, &config)
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_enabled()
    }

    pub fn cohorts(&self) -> &CohortRegistry {
        &self.cohorts
    }

    /// Looks up a registered cohort by network and index.
    pub fn cohort(&self, network: &str, index: u32) -> Result<&Cohort, AnalysisError> {
        self.cohorts
            .get(network, index)
            .ok_or_else(|| AnalysisError::UnknownCohort {
                network: network.trim().to_owned(),
                index,
            })
    }

    /// Uncached referenda resolution for the cohort under `tracks`.
    pub async fn resolve_referenda(
        &self,
        cohort: &Cohort,
        tracks: &TrackFilter,
    ) -> Result<ResolvedReferenda, AnalysisError> {
        resolve_cohort_referenda(self.source.as_ref(), cohort, tracks, &self.settings).await
    }

    pub async fn delegates_with_stats(
        &self,
        cohort: &Cohort,
        tracks: Option<&[String]>,
    ) -> Result<DelegatesReport, AnalysisError> {
        let tracks = TrackFilter::resolve(tracks, cohort);
        let key = cache_key(
            AnalyticsOperation::DelegatesWithStats,
            &cohort.network,
            cohort.index,
            &tracks,
        );
        self.cache
            .get_or_compute(&key, || async {
                let resolved = Arc::new(self.resolve_referenda(cohort, &tracks).await?);
                cohort_delegate_stats(self.source.clone(), cohort, resolved, &self.settings).await
            })
            .await
    }

    pub async fn influence(
        &self,
        cohort: &Cohort,
        tracks: Option<&[String]>,
    ) -> Result<InfluenceReport, AnalysisError> {
        let tracks = TrackFilter::resolve(tracks, cohort);
        let key = cache_key(
            AnalyticsOperation::Influence,
            &cohort.network,
            cohort.index,
            &tracks,
        );
        self.cache
            .get_or_compute(&key, || async {
                let resolved = Arc::new(self.resolve_referenda(cohort, &tracks).await?);
                analyze_cohort_influence(self.source.clone(), cohort, resolved, &self.settings)
                    .await
            })
            .await
    }

    pub async fn voting_matrix(
        &self,
        cohort: &Cohort,
        tracks: Option<&[String]>,
    ) -> Result<VotingMatrix, AnalysisError> {
        let tracks = TrackFilter::resolve(tracks, cohort);
        let key = cache_key(
            AnalyticsOperation::VotingMatrix,
            &cohort.network,
            cohort.index,
            &tracks,
        );
        self.cache
            .get_or_compute(&key, || async {
                let resolved = Arc::new(self.resolve_referenda(cohort, &tracks).await?);
                build_voting_matrix(self.source.clone(), cohort, resolved, &self.settings).await
            })
            .await
    }
}
