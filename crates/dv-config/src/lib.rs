use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod cohorts;

pub use cohorts::{CohortRegistry, load_cohort_registry};

pub const DV_DIR_NAME: &str = ".dv";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_COHORTS_FILE: &str = ".dv/cohorts.toml";
pub const DEFAULT_CACHE_SQLITE_FILE: &str = ".dv/cache.sqlite";
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_MAX_PAGES: u32 = 1000;
pub const DEFAULT_MAX_INFLUENCE_REFERENDA: usize = 1000;
pub const DEFAULT_MATRIX_VOTE_LIMIT: u32 = 1000;
pub const DEFAULT_ANALYSIS_CONCURRENCY: usize = 8;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
    Disabled,
}

impl CacheBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DvConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub cohorts: CohortsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Indexer GraphQL endpoint per network name.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            endpoints: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_influence_referenda")]
    pub max_influence_referenda: usize,
    #[serde(default = "default_matrix_vote_limit")]
    pub matrix_vote_limit: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            concurrency: default_analysis_concurrency(),
            max_influence_referenda: default_max_influence_referenda(),
            matrix_vote_limit: default_matrix_vote_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ttl_secs: default_cache_ttl_secs(),
            sqlite_path: default_cache_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortsConfig {
    #[serde(default = "default_cohorts_path")]
    pub path: String,
}

impl Default for CohortsConfig {
    fn default() -> Self {
        Self {
            path: default_cohorts_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

pub fn dv_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(DV_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    dv_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn load_workspace_config(workspace_root: impl AsRef<Path>) -> Result<DvConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(DvConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<DvConfig, ConfigError> {
    let parsed: DvConfig = toml::from_str(raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(workspace_root: impl AsRef<Path>) -> Result<DvConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(dv_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = DvConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &DvConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.source.endpoints.is_empty() {
        warnings.push(ConfigWarning {
            code: "source.endpoints.empty",
            message: "no indexer endpoints configured; only injected sources will work".to_owned(),
        });
    }
    for (network, endpoint) in &config.source.endpoints {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            warnings.push(ConfigWarning {
                code: "source.endpoints.scheme",
                message: format!("endpoint for '{network}' is not an http(s) URL: {endpoint}"),
            });
        }
    }
    if config.pagination.page_size > 1000 {
        warnings.push(ConfigWarning {
            code: "pagination.page_size.large",
            message: format!(
                "page_size {} exceeds the indexer's usual 1000-row limit",
                config.pagination.page_size
            ),
        });
    }
    if config.cache.backend != CacheBackend::Disabled && config.cache.ttl_secs == 0 {
        warnings.push(ConfigWarning {
            code: "cache.ttl_secs.zero",
            message: "cache ttl_secs is 0; every cached entry expires immediately".to_owned(),
        });
    }

    warnings
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_analysis_concurrency() -> usize {
    DEFAULT_ANALYSIS_CONCURRENCY
}

fn default_max_influence_referenda() -> usize {
    DEFAULT_MAX_INFLUENCE_REFERENDA
}

fn default_matrix_vote_limit() -> u32 {
    DEFAULT_MATRIX_VOTE_LIMIT
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_cache_sqlite_path() -> String {
    DEFAULT_CACHE_SQLITE_FILE.to_owned()
}

fn default_cohorts_path() -> String {
    DEFAULT_COHORTS_FILE.to_owned()
}

fn normalize_config(mut config: DvConfig) -> DvConfig {
    config.source.endpoints = config
        .source
        .endpoints
        .into_iter()
        .map(|(network, endpoint)| {
            (
                dv_core::normalize_network(&network),
                endpoint.trim().trim_end_matches('/').to_owned(),
            )
        })
        .filter(|(network, endpoint)| !network.is_empty() && !endpoint.is_empty())
        .collect();
    config.source.request_timeout_secs = config.source.request_timeout_secs.max(1);

    config.pagination.page_size = config.pagination.page_size.max(1);
    config.pagination.max_pages = config.pagination.max_pages.max(1);

    config.analysis.concurrency = config.analysis.concurrency.max(1);
    config.analysis.matrix_vote_limit = config.analysis.matrix_vote_limit.max(1);

    let sqlite_path = config.cache.sqlite_path.trim();
    config.cache.sqlite_path = if sqlite_path.is_empty() {
        default_cache_sqlite_path()
    } else {
        sqlite_path.to_owned()
    };

    let cohorts_path = config.cohorts.path.trim();
    config.cohorts.path = if cohorts_path.is_empty() {
        default_cohorts_path()
    } else {
        cohorts_path.to_owned()
    };

    config
}
