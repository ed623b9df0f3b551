use dv_config::{
    DEFAULT_ANALYSIS_CONCURRENCY, DEFAULT_MATRIX_VOTE_LIMIT, DEFAULT_MAX_INFLUENCE_REFERENDA,
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, DvConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub page_size: u32,
    pub max_pages: u32,
    pub max_influence_referenda: usize,
    pub matrix_vote_limit: u32,
    pub concurrency: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            max_influence_referenda: DEFAULT_MAX_INFLUENCE_REFERENDA,
            matrix_vote_limit: DEFAULT_MATRIX_VOTE_LIMIT,
            concurrency: DEFAULT_ANALYSIS_CONCURRENCY,
        }
    }
}

impl From<&DvConfig> for AnalysisSettings {
    fn from(config: &DvConfig) -> Self {
        Self {
            page_size: config.pagination.page_size.max(1),
            max_pages: config.pagination.max_pages.max(1),
            max_influence_referenda: config.analysis.max_influence_referenda,
            matrix_vote_limit: config.analysis.matrix_vote_limit.max(1),
            concurrency: config.analysis.concurrency.max(1),
        }
    }
}
