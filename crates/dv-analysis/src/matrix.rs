use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dv_core::{Cohort, Delegate, DelegateType, ReferendumIndex, Vote, VoteDecision};
use dv_source::GovernanceSource;
use serde::{Deserialize, Serialize};

use crate::eligibility::eligible_referenda;
use crate::fanout::run_bounded;
use crate::pagination::DEFAULT_START_PAGE;
use crate::vote_stats::rounded_percent;
use crate::votes::latest_votes_by_referendum;
use crate::{AnalysisError, AnalysisSettings, ResolvedReferenda};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteCell {
    Aye,
    Nay,
    Abstain,
    Novote,
}

impl VoteCell {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aye => "aye",
            Self::Nay => "nay",
            Self::Abstain => "abstain",
            Self::Novote => "novote",
        }
    }
}

impl From<VoteDecision> for VoteCell {
    fn from(decision: VoteDecision) -> Self {
        match decision {
            VoteDecision::Aye => Self::Aye,
            VoteDecision::Nay => Self::Nay,
            VoteDecision::Abstain => Self::Abstain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub delegate_type: DelegateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub votes: BTreeMap<ReferendumIndex, VoteCell>,
    pub eligible_count: u32,
    pub voted_count: u32,
    pub aye_count: u32,
    pub participation: f64,
    pub aye_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingMatrix {
    pub network: String,
    pub cohort_index: u32,
    pub tracks: Vec<String>,
    pub referenda: Vec<ReferendumIndex>,
    pub delegates: BTreeMap<String, MatrixRow>,
}

/// Dense row over `eligible`: every eligible index gets a cell, missing
/// votes become `novote` and votes outside the set are ignored.
pub fn build_matrix_row(
    delegate: &Delegate,
    eligible: &BTreeSet<ReferendumIndex>,
    votes: Vec<Vote>,
    cutoff: Option<DateTime<Utc>>,
) -> MatrixRow {
    let counted = latest_votes_by_referendum(votes, &delegate.address, cutoff);
    let votes = eligible
        .iter()
        .map(|index| {
            let cell = counted
                .get(index)
                .map(|vote| VoteCell::from(vote.decision))
                .unwrap_or(VoteCell::Novote);
            (*index, cell)
        })
        .collect::<BTreeMap<_, _>>();

    let voted_count = votes.values().filter(|cell| **cell != VoteCell::Novote).count() as u32;
    let aye_count = votes.values().filter(|cell| **cell == VoteCell::Aye).count() as u32;
    let eligible_count = eligible.len() as u32;

    MatrixRow {
        delegate_type: delegate.delegate_type,
        name: delegate.name.clone(),
        votes,
        eligible_count,
        voted_count,
        aye_count,
        participation: rounded_percent(voted_count, eligible_count),
        aye_rate: rounded_percent(aye_count, voted_count),
    }
}

/// Delegate x referendum table. Each delegate gets a single vote page;
/// any fetch error fails the whole matrix.
pub async fn build_voting_matrix(
    source: Arc<dyn GovernanceSource>,
    cohort: &Cohort,
    resolved: Arc<ResolvedReferenda>,
    settings: &AnalysisSettings,
) -> Result<VotingMatrix, AnalysisError> {
    let network = resolved.network.clone();
    let cutoff = cohort.end_time;
    let limit = settings.matrix_vote_limit;
    let delegates = cohort
        .delegate_addresses()
        .into_iter()
        .filter_map(|address| cohort.delegate(&address).cloned())
        .collect::<Vec<_>>();

    let rows = run_bounded(delegates, settings.concurrency, |delegate| {
        let source = source.clone();
        let resolved = resolved.clone();
        let network = network.clone();
        async move {
            let eligible = eligible_referenda(resolved.referenda.values(), &delegate.window());
            let address = delegate.address.trim().to_owned();
            let voters = vec![address.clone()];
            let votes = source
                .votes_for_addresses(&network, &voters, DEFAULT_START_PAGE, limit)
                .await?;
            let row = build_matrix_row(&delegate, &eligible, votes, cutoff);
            Ok::<_, AnalysisError>((address, row))
        }
    })
    .await?
    .into_iter()
    .collect::<Result<BTreeMap<_, _>, _>>()?;

    let referenda = rows
        .values()
        .flat_map(|row| row.votes.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();

    tracing::debug!(
        network = %network,
        cohort = cohort.index,
        delegates = rows.len(),
        referenda = referenda.len(),
        "built voting matrix"
    );

    Ok(VotingMatrix {
        network,
        cohort_index: cohort.index,
        tracks: resolved.tracks.clone(),
        referenda,
        delegates: rows,
    })
}
