use thiserror::Error;

mod cache;
mod eligibility;
mod engine;
mod fanout;
mod influence;
mod matrix;
mod pagination;
mod resolver;
mod settings;
mod tracks;
mod vote_stats;
mod votes;

pub use cache::{AnalyticsCache, AnalyticsOperation, cache_key};
pub use eligibility::{eligible_referenda, is_eligible};
pub use engine::DvAnalyticsEngine;
pub use influence::{
    Counterfactual, DelegateReferendumVote, Influence, InfluenceReport, InfluenceSummary,
    ReferendumInfluence, TrackInfluenceSummary, analyze_cohort_influence, classify_counterfactual,
    compute_referendum_influence,
};
pub use matrix::{MatrixRow, VoteCell, VotingMatrix, build_matrix_row, build_voting_matrix};
pub use pagination::{DEFAULT_START_PAGE, fetch_all_pages};
pub use resolver::{ResolvedReferenda, dedup_referenda, resolve_cohort_referenda};
pub use settings::AnalysisSettings;
pub use tracks::TrackFilter;
pub use vote_stats::{
    DelegateWithStats, DelegatesReport, VoteStats, cohort_delegate_stats, compute_vote_stats,
    delegate_vote_stats,
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] dv_config::ConfigError),
    #[error("source error: {0}")]
    Source(#[from] dv_source::SourceError),
    #[error("store error: {0}")]
    Store(#[from] dv_store::StoreError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown cohort {index} for network '{network}'")]
    UnknownCohort { network: String, index: u32 },
    #[error("analysis task failed: {0}")]
    Task(String),
}
