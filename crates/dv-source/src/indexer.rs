use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dv_config::SourceConfig;
use dv_core::{
    BlockNumber, Referendum, ReferendumIndex, ReferendumStatus, StatusHistoryEntry, Vote,
    VoteDecision, VoteMetrics, VotingPower, normalize_network,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{GovernanceSource, SourceError, VoteWindowQuery, page_offset};

pub const INDEXER_SOURCE_NAME: &str = "indexer";

const VOTE_FIELDS: &str = r#"
    voter
    proposalIndex
    decision
    totalVotingPower
    createdAt
    createdAtBlock
    proposal {
      index
      status
      origin
      title
      description
      proposer
      createdAt
      createdAtBlock
      updatedAtBlock
      statusHistory(orderBy: timestamp_ASC) {
        status
        block
        timestamp
      }
      tally {
        ayes
        nays
        support
      }
    }
"#;

const LATEST_BLOCK_QUERY: &str = "query LatestBlock { squidStatus { height } }";

/// GraphQL client for the governance indexer, one endpoint per network.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    client: reqwest::Client,
    endpoints: BTreeMap<String, String>,
}

impl IndexerClient {
    pub fn new(
        endpoints: BTreeMap<String, String>,
        request_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let endpoints = endpoints
            .into_iter()
            .map(|(network, endpoint)| (normalize_network(&network), endpoint))
            .collect();
        Ok(Self { client, endpoints })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        Self::new(
            config.endpoints.clone(),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    fn endpoint(&self, network: &str) -> Result<&str, SourceError> {
        let network = normalize_network(network);
        self.endpoints
            .get(&network)
            .map(String::as_str)
            .ok_or(SourceError::UnknownNetwork(network))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        network: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, SourceError> {
        let endpoint = self.endpoint(network)?;
        let response = self
            .client
            .post(endpoint)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await?
            .error_for_status()?
            .json::<GraphqlResponse<T>>()
            .await?;
        response.into_data()
    }

    async fn fetch_votes(
        &self,
        network: &str,
        query: &str,
        variables: Value,
    ) -> Result<Vec<Vote>, SourceError> {
        let data: VotesData = self.execute(network, query, variables).await?;
        tracing::trace!(
            network = %network,
            rows = data.flattened_conviction_votes.len(),
            "indexer vote page received"
        );
        data.flattened_conviction_votes
            .into_iter()
            .map(WireVote::into_vote)
            .collect()
    }
}

#[async_trait]
impl GovernanceSource for IndexerClient {
    async fn votes_for_addresses_and_referenda(
        &self,
        query: &VoteWindowQuery,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Vote>, SourceError> {
        let mut variables = json!({
            "voters": query.voters,
            "startBlock": query.start_block,
            "endBlock": query.end_block,
            "limit": limit,
            "offset": page_offset(page, limit),
        });
        let graphql = match &query.referendum_indices {
            Some(indices) => {
                variables["indices"] = json!(indices);
                votes_in_window_query(true)
            }
            None => votes_in_window_query(false),
        };
        self.fetch_votes(&query.network, &graphql, variables).await
    }

    async fn votes_for_addresses(
        &self,
        network: &str,
        voters: &[String],
        page: u32,
        limit: u32,
    ) -> Result<Vec<Vote>, SourceError> {
        let graphql = format!(
            r#"query VotesForAddresses($voters: [String!]!, $limit: Int!, $offset: Int!) {{
  flattenedConvictionVotes(
    where: {{ voter_in: $voters, removedAtBlock_isNull: true }}
    orderBy: createdAtBlock_ASC
    limit: $limit
    offset: $offset
  ) {{{VOTE_FIELDS}  }}
}}"#
        );
        let variables = json!({
            "voters": voters,
            "limit": limit,
            "offset": page_offset(page, limit),
        });
        self.fetch_votes(network, &graphql, variables).await
    }

    async fn latest_block_number(&self, network: &str) -> Result<BlockNumber, SourceError> {
        let data: SquidStatusData = self.execute(network, LATEST_BLOCK_QUERY, json!({})).await?;
        Ok(data.squid_status.height)
    }

    fn source_name(&self) -> &str {
        INDEXER_SOURCE_NAME
    }
}

fn votes_in_window_query(with_indices: bool) -> String {
    let (indices_param, indices_filter) = if with_indices {
        (", $indices: [Int!]!", " proposalIndex_in: $indices,")
    } else {
        ("", "")
    };
    format!(
        r#"query VotesInWindow($voters: [String!]!, $startBlock: Int!, $endBlock: Int!, $limit: Int!, $offset: Int!{indices_param}) {{
  flattenedConvictionVotes(
    where: {{ voter_in: $voters,{indices_filter} createdAtBlock_gte: $startBlock, createdAtBlock_lte: $endBlock, removedAtBlock_isNull: true }}
    orderBy: createdAtBlock_ASC
    limit: $limit
    offset: $offset
  ) {{{VOTE_FIELDS}  }}
}}"#
    )
}

fn parse_decision(value: &str) -> VoteDecision {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "aye" => VoteDecision::Aye,
        "no" | "nay" => VoteDecision::Nay,
        _ => VoteDecision::Abstain,
    }
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

impl<T> GraphqlResponse<T> {
    fn into_data(self) -> Result<T, SourceError> {
        if !self.errors.is_empty() {
            let messages = self
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SourceError::Graphql(messages));
        }
        self.data
            .ok_or_else(|| SourceError::InvalidResponse("response has no data".to_owned()))
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SquidStatusData {
    squid_status: SquidStatus,
}

#[derive(Debug, Deserialize)]
struct SquidStatus {
    height: BlockNumber,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VotesData {
    #[serde(default)]
    flattened_conviction_votes: Vec<WireVote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVote {
    voter: String,
    proposal_index: ReferendumIndex,
    decision: String,
    #[serde(default)]
    total_voting_power: Option<VotingPower>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    created_at_block: Option<BlockNumber>,
    #[serde(default)]
    proposal: Option<WireProposal>,
}

impl WireVote {
    fn into_vote(self) -> Result<Vote, SourceError> {
        if self.voter.trim().is_empty() {
            return Err(SourceError::InvalidResponse(format!(
                "vote on referendum {} has no voter",
                self.proposal_index
            )));
        }
        Ok(Vote {
            voter_address: self.voter.trim().to_owned(),
            proposal_index: self.proposal_index,
            decision: parse_decision(&self.decision),
            total_voting_power: self.total_voting_power.unwrap_or_default(),
            created_at: self.created_at,
            created_at_block: self.created_at_block,
            proposal: self.proposal.map(WireProposal::into_referendum),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProposal {
    index: ReferendumIndex,
    status: ReferendumStatus,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    proposer: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at_block: Option<BlockNumber>,
    #[serde(default)]
    updated_at_block: Option<BlockNumber>,
    #[serde(default)]
    status_history: Vec<WireStatusHistory>,
    #[serde(default)]
    tally: Option<WireTally>,
}

impl WireProposal {
    fn into_referendum(self) -> Referendum {
        let vote_metrics = self
            .tally
            .map(|tally| VoteMetrics {
                aye: tally.ayes.unwrap_or_default(),
                nay: tally.nays.unwrap_or_default(),
                support: tally.support,
                aye_count: None,
                nay_count: None,
            })
            .unwrap_or_default();
        Referendum {
            index: self.index,
            status: self.status,
            origin: self.origin.unwrap_or_default(),
            title: self.title,
            description: self.description,
            proposer: self.proposer,
            created_at: self.created_at,
            created_at_block: self.created_at_block,
            updated_at_block: self.updated_at_block,
            status_history: self
                .status_history
                .into_iter()
                .map(|entry| StatusHistoryEntry {
                    status: entry.status,
                    block: entry.block,
                    timestamp: entry.timestamp,
                })
                .collect(),
            vote_metrics,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireStatusHistory {
    status: ReferendumStatus,
    #[serde(default)]
    block: Option<BlockNumber>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct WireTally {
    #[serde(default)]
    ayes: Option<VotingPower>,
    #[serde(default)]
    nays: Option<VotingPower>,
    #[serde(default)]
    support: Option<VotingPower>,
}
