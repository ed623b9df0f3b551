use async_trait::async_trait;
use dv_core::{BlockNumber, ReferendumIndex, Vote};
use thiserror::Error;

mod indexer;
mod mock;

pub use indexer::IndexerClient;
pub use mock::MockGovernanceSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("indexer returned errors: {0}")]
    Graphql(String),
    #[error("no indexer endpoint configured for network '{0}'")]
    UnknownNetwork(String),
    #[error("invalid indexer response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Unavailable(String),
}

/// Votes by a set of voters inside a block window, optionally narrowed to
/// specific referenda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteWindowQuery {
    pub network: String,
    pub voters: Vec<String>,
    pub start_block: BlockNumber,
    pub end_block: BlockNumber,
    pub referendum_indices: Option<Vec<ReferendumIndex>>,
}

/// On-chain vote and referendum data. Pages are 1-based; an empty page
/// means the result set is exhausted.
#[async_trait]
pub trait GovernanceSource: Send + Sync {
    async fn votes_for_addresses_and_referenda(
        &self,
        query: &VoteWindowQuery,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Vote>, SourceError>;

    async fn votes_for_addresses(
        &self,
        network: &str,
        voters: &[String],
        page: u32,
        limit: u32,
    ) -> Result<Vec<Vote>, SourceError>;

    async fn latest_block_number(&self, network: &str) -> Result<BlockNumber, SourceError>;

    fn source_name(&self) -> &str;
}

pub(crate) fn page_offset(page: u32, limit: u32) -> usize {
    (page.max(1) as usize - 1).saturating_mul(limit as usize)
}
