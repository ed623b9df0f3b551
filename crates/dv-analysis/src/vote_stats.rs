use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dv_core::{
    BlockNumber, Cohort, CohortReferendum, Delegate, DelegateType, ReferendumIndex, Vote,
    VoteDecision, VotingPower,
};
use dv_source::GovernanceSource;
use serde::{Deserialize, Serialize};

use crate::eligibility::eligible_referenda;
use crate::fanout::run_bounded;
use crate::pagination::{DEFAULT_START_PAGE, fetch_all_pages};
use crate::votes::latest_votes_by_referendum;
use crate::{AnalysisError, AnalysisSettings, ResolvedReferenda};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VoteStats {
    pub eligible_referenda: u32,
    pub total_votes: u32,
    pub aye_count: u32,
    pub nay_count: u32,
    pub abstain_count: u32,
    pub winning_votes: u32,
    pub participation: f64,
    pub win_rate: f64,
    pub voting_power: VotingPower,
}

impl VoteStats {
    pub fn zeroed(eligible_referenda: u32) -> Self {
        Self {
            eligible_referenda,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateWithStats {
    pub address: String,
    pub delegate_type: DelegateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub start_block: BlockNumber,
    pub end_block: Option<BlockNumber>,
    pub stats: VoteStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegatesReport {
    pub network: String,
    pub cohort_index: u32,
    pub start_block: BlockNumber,
    pub end_block: BlockNumber,
    pub tracks: Vec<String>,
    pub referenda_count: usize,
    pub delegates: BTreeMap<String, DelegateWithStats>,
}

/// Tallies one delegate's counted votes over its eligible referenda.
pub fn compute_vote_stats(
    votes: Vec<Vote>,
    address: &str,
    eligible: &BTreeMap<ReferendumIndex, CohortReferendum>,
    cutoff: Option<DateTime<Utc>>,
) -> VoteStats {
    let counted = latest_votes_by_referendum(votes, address, cutoff);
    let mut stats = VoteStats::zeroed(eligible.len() as u32);

    for (index, vote) in &counted {
        let Some(referendum) = eligible.get(index) else {
            continue;
        };
        stats.total_votes += 1;
        stats.voting_power += &vote.total_voting_power;

        let status = referendum.status_as_of(cutoff);
        match vote.decision {
            VoteDecision::Aye => {
                stats.aye_count += 1;
                if status.is_closed() && status.is_passed() {
                    stats.winning_votes += 1;
                }
            }
            VoteDecision::Nay => {
                stats.nay_count += 1;
                if status.is_closed() && status.is_failed() {
                    stats.winning_votes += 1;
                }
            }
            VoteDecision::Abstain => stats.abstain_count += 1,
        }
    }

    stats.participation = rounded_percent(stats.total_votes, stats.eligible_referenda);
    stats.win_rate = rounded_percent(stats.winning_votes, stats.aye_count + stats.nay_count);
    stats
}

/// Fetches every vote of `delegate` and scores it. Fetch failures yield
/// zeroed stats so one unreachable address never sinks the cohort.
pub async fn delegate_vote_stats(
    source: &dyn GovernanceSource,
    network: &str,
    delegate: &Delegate,
    eligible: &BTreeMap<ReferendumIndex, CohortReferendum>,
    cutoff: Option<DateTime<Utc>>,
    settings: &AnalysisSettings,
) -> VoteStats {
    let voters = vec![delegate.address.trim().to_owned()];
    let fetched = {
        let voters = voters.as_slice();
        let limit = settings.page_size;
        fetch_all_pages(
            move |page| source.votes_for_addresses(network, voters, page, limit),
            settings.max_pages,
            DEFAULT_START_PAGE,
        )
        .await
    };

    match fetched {
        Ok(votes) => compute_vote_stats(votes, &delegate.address, eligible, cutoff),
        Err(err) => {
            tracing::warn!(
                network,
                address = %delegate.address,
                error = %err,
                "failed to fetch delegate votes; reporting zeroed stats"
            );
            VoteStats::zeroed(eligible.len() as u32)
        }
    }
}

/// Stats for every delegate of the cohort, one task per delegate.
pub async fn cohort_delegate_stats(
    source: Arc<dyn GovernanceSource>,
    cohort: &Cohort,
    resolved: Arc<ResolvedReferenda>,
    settings: &AnalysisSettings,
) -> Result<DelegatesReport, AnalysisError> {
    let network = resolved.network.clone();
    let cutoff = cohort.end_time;
    let delegates = cohort
        .delegate_addresses()
        .into_iter()
        .filter_map(|address| cohort.delegate(&address).cloned())
        .collect::<Vec<_>>();

    let settings_copy = *settings;
    let outcomes = run_bounded(delegates, settings.concurrency, |delegate| {
        let source = source.clone();
        let resolved = resolved.clone();
        let network = network.clone();
        async move {
            let window = delegate.window();
            let eligible = eligible_referenda(resolved.referenda.values(), &window)
                .into_iter()
                .filter_map(|index| {
                    resolved
                        .get(index)
                        .map(|referendum| (index, referendum.clone()))
                })
                .collect::<BTreeMap<_, _>>();
            let stats = delegate_vote_stats(
                source.as_ref(),
                &network,
                &delegate,
                &eligible,
                cutoff,
                &settings_copy,
            )
            .await;
            (delegate, stats)
        }
    })
    .await?;

    let delegates = outcomes
        .into_iter()
        .map(|(delegate, stats)| {
            let address = delegate.address.trim().to_owned();
            let entry = DelegateWithStats {
                address: address.clone(),
                delegate_type: delegate.delegate_type,
                name: delegate.name,
                start_block: delegate.start_block,
                end_block: delegate.end_block,
                stats,
            };
            (address, entry)
        })
        .collect::<BTreeMap<_, _>>();

    tracing::debug!(
        network = %network,
        cohort = cohort.index,
        delegates = delegates.len(),
        "computed delegate vote stats"
    );

    Ok(DelegatesReport {
        network,
        cohort_index: cohort.index,
        start_block: resolved.start_block,
        end_block: resolved.end_block,
        tracks: resolved.tracks.clone(),
        referenda_count: resolved.len(),
        delegates,
    })
}

/// `numerator / denominator` as a percentage with two decimals in `0..=100`.
/// A zero denominator yields zero.
pub(crate) fn rounded_percent(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let percent = f64::from(numerator) / f64::from(denominator) * 100.0;
    ((percent * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use dv_core::{ReferendumStatus, StatusHistoryEntry, VoteMetrics};

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, day, 0, 0, 0)
            .single()
            .expect("timestamp")
    }

    fn referendum(index: u32, status: ReferendumStatus) -> CohortReferendum {
        CohortReferendum {
            index,
            status,
            origin: "Root".to_owned(),
            description: None,
            vote_metrics: VoteMetrics::default(),
            created_at_block: Some(100),
            updated_at_block: None,
            status_history: Vec::new(),
        }
    }

    fn vote(index: u32, decision: VoteDecision, day: u32) -> Vote {
        Vote {
            voter_address: "delegate".to_owned(),
            proposal_index: index,
            decision,
            total_voting_power: VotingPower::from(5u64),
            created_at: at(day),
            created_at_block: Some(100),
            proposal: None,
        }
    }

    #[test]
    fn rounded_percent_handles_zero_and_rounding() {
        assert_eq!(rounded_percent(0, 0), 0.0);
        assert_eq!(rounded_percent(1, 3), 33.33);
        assert_eq!(rounded_percent(2, 3), 66.67);
        assert_eq!(rounded_percent(4, 4), 100.0);
    }

    #[test]
    fn tallies_decisions_and_wins() {
        let eligible = BTreeMap::from([
            (1, referendum(1, ReferendumStatus::Executed)),
            (2, referendum(2, ReferendumStatus::Rejected)),
            (3, referendum(3, ReferendumStatus::Approved)),
            (4, referendum(4, ReferendumStatus::Deciding)),
        ]);
        let votes = vec![
            vote(1, VoteDecision::Aye, 1),
            vote(2, VoteDecision::Nay, 1),
            vote(3, VoteDecision::Nay, 1),
            vote(9, VoteDecision::Aye, 1),
            vote(4, VoteDecision::Abstain, 1),
        ];

        let stats = compute_vote_stats(votes, "delegate", &eligible, None);
        assert_eq!(stats.eligible_referenda, 4);
        assert_eq!(stats.total_votes, 4);
        assert_eq!(stats.aye_count, 1);
        assert_eq!(stats.nay_count, 2);
        assert_eq!(stats.abstain_count, 1);
        assert_eq!(stats.winning_votes, 2);
        assert_eq!(stats.participation, 100.0);
        assert_eq!(stats.win_rate, 66.67);
        assert_eq!(stats.voting_power, VotingPower::from(20u64));
    }

    #[test]
    fn win_uses_status_at_cohort_end() {
        let mut passed_later = referendum(1, ReferendumStatus::Executed);
        passed_later.status_history = vec![
            StatusHistoryEntry {
                status: ReferendumStatus::Rejected,
                block: Some(150),
                timestamp: at(5),
            },
            StatusHistoryEntry {
                status: ReferendumStatus::Executed,
                block: Some(250),
                timestamp: at(20),
            },
        ];
        let eligible = BTreeMap::from([(1, passed_later)]);
        let votes = vec![vote(1, VoteDecision::Nay, 2), vote(1, VoteDecision::Aye, 15)];

        let stats = compute_vote_stats(votes, "delegate", &eligible, Some(at(10)));
        assert_eq!(stats.nay_count, 1);
        assert_eq!(stats.aye_count, 0);
        assert_eq!(stats.winning_votes, 1);
        assert_eq!(stats.win_rate, 100.0);
    }

    #[test]
    fn no_votes_yield_zero_rates() {
        let eligible = BTreeMap::from([(1, referendum(1, ReferendumStatus::Executed))]);
        let stats = compute_vote_stats(Vec::new(), "delegate", &eligible, None);
        assert_eq!(stats, VoteStats::zeroed(1));
        assert_eq!(stats.participation, 0.0);
        assert_eq!(stats.win_rate, 0.0);
    }
}
