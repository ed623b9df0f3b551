use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dv_core::{BlockNumber, ReferendumIndex, Vote, normalize_network};

use crate::{GovernanceSource, SourceError, VoteWindowQuery, page_offset};

pub const MOCK_SOURCE_NAME: &str = "mock";

/// In-memory source over a fixed vote set. Pages are sliced from the
/// filtered votes in insertion order.
#[derive(Debug, Default)]
pub struct MockGovernanceSource {
    votes: Vec<Vote>,
    latest_blocks: HashMap<String, BlockNumber>,
    fallback_latest_block: BlockNumber,
    failing_voters: BTreeSet<String>,
    failing_referenda: BTreeSet<ReferendumIndex>,
    vote_calls: AtomicUsize,
    latest_block_calls: AtomicUsize,
}

impl MockGovernanceSource {
    pub fn new(votes: Vec<Vote>) -> Self {
        Self {
            votes,
            ..Self::default()
        }
    }

    pub fn with_latest_block(mut self, network: &str, block: BlockNumber) -> Self {
        self.latest_blocks.insert(normalize_network(network), block);
        self
    }

    pub fn with_fallback_latest_block(mut self, block: BlockNumber) -> Self {
        self.fallback_latest_block = block;
        self
    }

    /// Any request naming this voter fails.
    pub fn with_failing_voter(mut self, address: &str) -> Self {
        self.failing_voters.insert(address.trim().to_owned());
        self
    }

    /// Any request narrowed to this referendum fails.
    pub fn with_failing_referendum(mut self, index: ReferendumIndex) -> Self {
        self.failing_referenda.insert(index);
        self
    }

    pub fn vote_calls(&self) -> usize {
        self.vote_calls.load(Ordering::SeqCst)
    }

    pub fn latest_block_calls(&self) -> usize {
        self.latest_block_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.vote_calls() + self.latest_block_calls()
    }

    fn check_voters(&self, voters: &[String]) -> Result<(), SourceError> {
        match voters
            .iter()
            .find(|voter| self.failing_voters.contains(voter.trim()))
        {
            Some(voter) => Err(SourceError::Unavailable(format!(
                "mock failure for voter {voter}"
            ))),
            None => Ok(()),
        }
    }

    fn page(votes: Vec<&Vote>, page: u32, limit: u32) -> Vec<Vote> {
        votes
            .into_iter()
            .skip(page_offset(page, limit))
            .take(limit as usize)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GovernanceSource for MockGovernanceSource {
    async fn votes_for_addresses_and_referenda(
        &self,
        query: &VoteWindowQuery,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Vote>, SourceError> {
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        self.check_voters(&query.voters)?;
        let failing_index = query.referendum_indices.as_ref().and_then(|indices| {
            indices
                .iter()
                .find(|index| self.failing_referenda.contains(index))
        });
        if let Some(index) = failing_index {
            return Err(SourceError::Unavailable(format!(
                "mock failure for referendum {index}"
            )));
        }

        let matching = self
            .votes
            .iter()
            .filter(|vote| query.voters.iter().any(|voter| voter == &vote.voter_address))
            .filter(|vote| {
                vote.created_at_block.is_none_or(|block| {
                    block >= query.start_block && block <= query.end_block
                })
            })
            .filter(|vote| {
                query
                    .referendum_indices
                    .as_ref()
                    .is_none_or(|indices| indices.contains(&vote.proposal_index))
            })
            .collect::<Vec<_>>();
        Ok(Self::page(matching, page, limit))
    }

    async fn votes_for_addresses(
        &self,
        _network: &str,
        voters: &[String],
        page: u32,
        limit: u32,
    ) -> Result<Vec<Vote>, SourceError> {
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        self.check_voters(voters)?;

        let matching = self
            .votes
            .iter()
            .filter(|vote| voters.iter().any(|voter| voter == &vote.voter_address))
            .collect::<Vec<_>>();
        Ok(Self::page(matching, page, limit))
    }

    async fn latest_block_number(&self, network: &str) -> Result<BlockNumber, SourceError> {
        self.latest_block_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .latest_blocks
            .get(&normalize_network(network))
            .copied()
            .unwrap_or(self.fallback_latest_block))
    }

    fn source_name(&self) -> &str {
        MOCK_SOURCE_NAME
    }
}
