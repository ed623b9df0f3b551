use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dv_core::{
    BlockNumber, Cohort, CohortReferendum, DelegateType, ReferendumIndex, ReferendumStatus, Vote,
    VoteDecision, VotingPower,
};
use dv_source::{GovernanceSource, VoteWindowQuery};
use serde::{Deserialize, Serialize};

use crate::eligibility::is_eligible;
use crate::fanout::run_bounded;
use crate::matrix::VoteCell;
use crate::pagination::{DEFAULT_START_PAGE, fetch_all_pages};
use crate::votes::latest_votes_by_voter;
use crate::{AnalysisError, AnalysisSettings, ResolvedReferenda};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Influence {
    Approved,
    Rejected,
    NoImpact,
}

impl Influence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::NoImpact => "NO_IMPACT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterfactual {
    pub is_passed: bool,
    pub is_failed: bool,
    pub would_pass_without_dv: bool,
    pub influence: Influence,
}

/// Re-decides the outcome with the cohort's power removed. Only a flip of
/// a decided outcome counts as influence.
pub fn classify_counterfactual(
    status: ReferendumStatus,
    aye_without_dv: &VotingPower,
    nay_without_dv: &VotingPower,
) -> Counterfactual {
    let is_passed = status.is_passed();
    let is_failed = status.is_failed();

    let mut would_pass_without_dv = is_passed;
    if is_passed && aye_without_dv <= nay_without_dv {
        would_pass_without_dv = false;
    }
    if is_failed && aye_without_dv > nay_without_dv {
        would_pass_without_dv = true;
    }

    let influence = if is_passed && !would_pass_without_dv {
        Influence::Approved
    } else if is_failed && would_pass_without_dv {
        Influence::Rejected
    } else {
        Influence::NoImpact
    };

    Counterfactual {
        is_passed,
        is_failed,
        would_pass_without_dv,
        influence,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateReferendumVote {
    pub delegate_type: DelegateType,
    pub decision: VoteCell,
    pub voting_power: VotingPower,
    pub eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferendumInfluence {
    pub index: ReferendumIndex,
    pub track: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ReferendumStatus,
    pub aye_total: VotingPower,
    pub nay_total: VotingPower,
    pub dv_aye_total: VotingPower,
    pub dv_nay_total: VotingPower,
    pub dv_abstain_total: VotingPower,
    pub aye_without_dv: VotingPower,
    pub nay_without_dv: VotingPower,
    pub is_passed: bool,
    pub is_failed: bool,
    pub would_pass_without_dv: bool,
    pub influence: Influence,
    pub dv_aye_share: f64,
    pub dv_nay_share: f64,
    pub dv_total_share: f64,
    pub voted_count: u32,
    pub not_voted_count: u32,
    pub delegates: BTreeMap<String, DelegateReferendumVote>,
    pub degraded: bool,
}

impl ReferendumInfluence {
    /// Record for a referendum whose votes could not be fetched: no DV
    /// contribution and no influence.
    pub fn neutral(
        referendum: &CohortReferendum,
        cohort: &Cohort,
        cutoff: Option<DateTime<Utc>>,
    ) -> Self {
        let status = referendum.status_as_of(cutoff);
        let aye_total = referendum.vote_metrics.aye.clone();
        let nay_total = referendum.vote_metrics.nay.clone();
        let is_passed = status.is_passed();
        let delegates = cohort
            .delegate_addresses()
            .into_iter()
            .filter_map(|address| {
                let delegate = cohort.delegate(&address)?;
                let entry = DelegateReferendumVote {
                    delegate_type: delegate.delegate_type,
                    decision: VoteCell::Novote,
                    voting_power: VotingPower::zero(),
                    eligible: is_eligible(referendum, &delegate.window()),
                };
                Some((address, entry))
            })
            .collect::<BTreeMap<_, _>>();

        Self {
            index: referendum.index,
            track: referendum.origin.clone(),
            description: referendum.description.clone(),
            status,
            aye_without_dv: aye_total.clone(),
            nay_without_dv: nay_total.clone(),
            aye_total,
            nay_total,
            dv_aye_total: VotingPower::zero(),
            dv_nay_total: VotingPower::zero(),
            dv_abstain_total: VotingPower::zero(),
            is_passed,
            is_failed: status.is_failed(),
            would_pass_without_dv: is_passed,
            influence: Influence::NoImpact,
            dv_aye_share: 0.0,
            dv_nay_share: 0.0,
            dv_total_share: 0.0,
            voted_count: 0,
            not_voted_count: delegates.len() as u32,
            delegates,
            degraded: true,
        }
    }
}

/// Counterfactual record for one referendum given the cohort's votes on it.
/// Only votes of delegates eligible for the referendum move the DV totals.
pub fn compute_referendum_influence(
    referendum: &CohortReferendum,
    cohort: &Cohort,
    votes: Vec<Vote>,
    cutoff: Option<DateTime<Utc>>,
) -> ReferendumInfluence {
    let counted = latest_votes_by_voter(votes, referendum.index, cutoff);

    let mut dv_aye_total = VotingPower::zero();
    let mut dv_nay_total = VotingPower::zero();
    let mut dv_abstain_total = VotingPower::zero();
    let mut voted_count = 0u32;
    let mut delegates = BTreeMap::new();

    for address in cohort.delegate_addresses() {
        let Some(delegate) = cohort.delegate(&address) else {
            continue;
        };
        let eligible = is_eligible(referendum, &delegate.window());
        let entry = match counted.get(&address) {
            Some(vote) => {
                if eligible {
                    voted_count += 1;
                    match vote.decision {
                        VoteDecision::Aye => dv_aye_total += &vote.total_voting_power,
                        VoteDecision::Nay => dv_nay_total += &vote.total_voting_power,
                        VoteDecision::Abstain => dv_abstain_total += &vote.total_voting_power,
                    }
                }
                DelegateReferendumVote {
                    delegate_type: delegate.delegate_type,
                    decision: VoteCell::from(vote.decision),
                    voting_power: vote.total_voting_power.clone(),
                    eligible,
                }
            }
            None => DelegateReferendumVote {
                delegate_type: delegate.delegate_type,
                decision: VoteCell::Novote,
                voting_power: VotingPower::zero(),
                eligible,
            },
        };
        delegates.insert(address, entry);
    }

    let aye_total = referendum.vote_metrics.aye.clone();
    let nay_total = referendum.vote_metrics.nay.clone();
    let aye_without_dv = aye_total.saturating_sub(&dv_aye_total);
    let nay_without_dv = nay_total.saturating_sub(&dv_nay_total);
    let status = referendum.status_as_of(cutoff);
    let outcome = classify_counterfactual(status, &aye_without_dv, &nay_without_dv);

    let dv_directional = &dv_aye_total + &dv_nay_total;
    let directional_total = &aye_total + &nay_total;

    ReferendumInfluence {
        index: referendum.index,
        track: referendum.origin.clone(),
        description: referendum.description.clone(),
        status,
        dv_aye_share: dv_aye_total.share_percent(&aye_total),
        dv_nay_share: dv_nay_total.share_percent(&nay_total),
        dv_total_share: dv_directional.share_percent(&directional_total),
        aye_total,
        nay_total,
        dv_aye_total,
        dv_nay_total,
        dv_abstain_total,
        aye_without_dv,
        nay_without_dv,
        is_passed: outcome.is_passed,
        is_failed: outcome.is_failed,
        would_pass_without_dv: outcome.would_pass_without_dv,
        influence: outcome.influence,
        voted_count,
        not_voted_count: (delegates.len() as u32).saturating_sub(voted_count),
        delegates,
        degraded: false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfluenceSummary {
    pub total: u32,
    pub approved: u32,
    pub rejected: u32,
    pub no_impact: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluenceSummary {
    pub total_referenda: u32,
    pub approved: u32,
    pub rejected: u32,
    pub no_impact: u32,
    pub degraded: u32,
    pub by_track: BTreeMap<String, TrackInfluenceSummary>,
}

impl InfluenceSummary {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ReferendumInfluence>,
    {
        let mut summary = Self::default();
        for record in records {
            summary.total_referenda += 1;
            if record.degraded {
                summary.degraded += 1;
            }
            let track = summary.by_track.entry(record.track.clone()).or_default();
            track.total += 1;
            match record.influence {
                Influence::Approved => {
                    summary.approved += 1;
                    track.approved += 1;
                }
                Influence::Rejected => {
                    summary.rejected += 1;
                    track.rejected += 1;
                }
                Influence::NoImpact => {
                    summary.no_impact += 1;
                    track.no_impact += 1;
                }
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceReport {
    pub network: String,
    pub cohort_index: u32,
    pub start_block: BlockNumber,
    pub end_block: BlockNumber,
    pub tracks: Vec<String>,
    pub summary: InfluenceSummary,
    pub referenda: BTreeMap<ReferendumIndex, ReferendumInfluence>,
}

/// Counterfactual analysis over the resolved referenda, one task per
/// referendum. A failed fetch degrades that referendum to a neutral record.
pub async fn analyze_cohort_influence(
    source: Arc<dyn GovernanceSource>,
    cohort: &Cohort,
    resolved: Arc<ResolvedReferenda>,
    settings: &AnalysisSettings,
) -> Result<InfluenceReport, AnalysisError> {
    let cohort_handle = Arc::new(cohort.clone());
    let voters = Arc::new(cohort.delegate_addresses());
    let cutoff = cohort.end_time;
    let settings_copy = *settings;

    if resolved.len() > settings.max_influence_referenda {
        tracing::warn!(
            network = %resolved.network,
            cohort = cohort.index,
            referenda = resolved.len(),
            cap = settings.max_influence_referenda,
            "influence analysis capped"
        );
    }
    let indices = resolved
        .referenda
        .keys()
        .copied()
        .take(settings.max_influence_referenda)
        .collect::<Vec<_>>();

    let outcomes = run_bounded(indices, settings.concurrency, |index| {
        let source = source.clone();
        let resolved = resolved.clone();
        let cohort = cohort_handle.clone();
        let voters = voters.clone();
        async move {
            let referendum = resolved.get(index)?;
            let query = VoteWindowQuery {
                network: resolved.network.clone(),
                voters: voters.as_ref().clone(),
                start_block: resolved.start_block,
                end_block: resolved.end_block,
                referendum_indices: Some(vec![index]),
            };
            let fetched = {
                let query = &query;
                let source = source.as_ref();
                let limit = settings_copy.page_size;
                fetch_all_pages(
                    move |page| source.votes_for_addresses_and_referenda(query, page, limit),
                    settings_copy.max_pages,
                    DEFAULT_START_PAGE,
                )
                .await
            };

            let record = match fetched {
                Ok(votes) => compute_referendum_influence(referendum, &cohort, votes, cutoff),
                Err(err) => {
                    tracing::warn!(
                        network = %resolved.network,
                        referendum = index,
                        error = %err,
                        "failed to fetch referendum votes; recording neutral influence"
                    );
                    ReferendumInfluence::neutral(referendum, &cohort, cutoff)
                }
            };
            Some((index, record))
        }
    })
    .await?;

    let referenda = outcomes.into_iter().flatten().collect::<BTreeMap<_, _>>();
    let summary = InfluenceSummary::from_records(referenda.values());

    tracing::debug!(
        network = %resolved.network,
        cohort = cohort.index,
        referenda = referenda.len(),
        approved = summary.approved,
        rejected = summary.rejected,
        degraded = summary.degraded,
        "computed cohort influence"
    );

    Ok(InfluenceReport {
        network: resolved.network.clone(),
        cohort_index: cohort.index,
        start_block: resolved.start_block,
        end_block: resolved.end_block,
        tracks: resolved.tracks.clone(),
        summary,
        referenda,
    })
}
