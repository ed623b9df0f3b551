use std::collections::BTreeMap;

use dv_core::{BlockNumber, Cohort, CohortReferendum, ReferendumIndex, Vote};
use dv_source::{GovernanceSource, VoteWindowQuery};
use serde::{Deserialize, Serialize};

use crate::pagination::{DEFAULT_START_PAGE, fetch_all_pages};
use crate::{AnalysisError, AnalysisSettings, TrackFilter};

/// Referenda in scope for one cohort, keyed by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReferenda {
    pub network: String,
    pub cohort_index: u32,
    pub start_block: BlockNumber,
    pub end_block: BlockNumber,
    pub tracks: Vec<String>,
    pub referenda: BTreeMap<ReferendumIndex, CohortReferendum>,
}

impl ResolvedReferenda {
    pub fn len(&self) -> usize {
        self.referenda.len()
    }

    pub fn is_empty(&self) -> bool {
        self.referenda.is_empty()
    }

    pub fn get(&self, index: ReferendumIndex) -> Option<&CohortReferendum> {
        self.referenda.get(&index)
    }
}

/// Resolves the referenda the cohort's delegates voted on inside the cohort
/// window. Votes cast after the cohort end time do not bring a referendum
/// into scope. Ongoing cohorts are bounded by the current chain head.
pub async fn resolve_cohort_referenda(
    source: &dyn GovernanceSource,
    cohort: &Cohort,
    tracks: &TrackFilter,
    settings: &AnalysisSettings,
) -> Result<ResolvedReferenda, AnalysisError> {
    let network = cohort.network();
    let end_block = match cohort.end_block {
        Some(end_block) => end_block,
        None => source.latest_block_number(&network).await?,
    };

    let query = VoteWindowQuery {
        network: network.clone(),
        voters: cohort.delegate_addresses(),
        start_block: cohort.start_block,
        end_block,
        referendum_indices: None,
    };
    let votes = if query.voters.is_empty() {
        Vec::new()
    } else {
        let query = &query;
        let limit = settings.page_size;
        fetch_all_pages(
            move |page| source.votes_for_addresses_and_referenda(query, page, limit),
            settings.max_pages,
            DEFAULT_START_PAGE,
        )
        .await?
    };
    let fetched = votes.len();
    let counted = votes
        .into_iter()
        .filter(|vote| vote.is_counted_before(cohort.end_time))
        .collect::<Vec<_>>();

    let referenda = dedup_referenda(counted)
        .into_iter()
        .filter(|(_, referendum)| tracks.allows(&referendum.origin))
        .filter(|(_, referendum)| {
            referendum
                .created_at_block
                .is_none_or(|block| block >= cohort.start_block && block <= end_block)
        })
        .collect::<BTreeMap<_, _>>();

    tracing::debug!(
        network = %network,
        cohort = cohort.index,
        votes = fetched,
        referenda = referenda.len(),
        end_block,
        "resolved cohort referenda"
    );

    Ok(ResolvedReferenda {
        network,
        cohort_index: cohort.index,
        start_block: cohort.start_block,
        end_block,
        tracks: tracks.tracks(),
        referenda,
    })
}

/// Extracts the referenda nested in `votes`, one per index. Votes are sorted
/// by (index, created_at, voter) first and the earliest snapshot wins.
pub fn dedup_referenda(mut votes: Vec<Vote>) -> BTreeMap<ReferendumIndex, CohortReferendum> {
    votes.sort_by(|left, right| {
        left.proposal_index
            .cmp(&right.proposal_index)
            .then(left.created_at.cmp(&right.created_at))
            .then(left.voter_address.cmp(&right.voter_address))
    });

    let mut referenda = BTreeMap::new();
    for vote in &votes {
        let Some(proposal) = vote.proposal.as_ref() else {
            continue;
        };
        referenda
            .entry(proposal.index)
            .or_insert_with(|| proposal.to_cohort_referendum());
    }
    referenda
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use dv_core::{
        Delegate, DelegateType, Referendum, ReferendumStatus, VoteDecision, VoteMetrics,
        VotingPower,
    };
    use dv_source::MockGovernanceSource;

    use super::*;

    fn proposal(index: u32, origin: &str, created_block: u64, title: &str) -> Referendum {
        Referendum {
            index,
            status: ReferendumStatus::Deciding,
            origin: origin.to_owned(),
            title: Some(title.to_owned()),
            description: None,
            proposer: None,
            created_at: None,
            created_at_block: Some(created_block),
            updated_at_block: None,
            status_history: Vec::new(),
            vote_metrics: VoteMetrics::default(),
        }
    }

    fn vote(voter: &str, minute: u32, proposal: Referendum) -> Vote {
        Vote {
            voter_address: voter.to_owned(),
            proposal_index: proposal.index,
            decision: VoteDecision::Aye,
            total_voting_power: VotingPower::from(1u64),
            created_at: Utc
                .with_ymd_and_hms(2024, 2, 1, 0, minute, 0)
                .single()
                .expect("timestamp"),
            created_at_block: proposal.created_at_block,
            proposal: Some(proposal),
        }
    }

    #[test]
    fn dedup_keeps_one_entry_per_index() {
        let votes = vec![
            vote("bob", 5, proposal(10, "Root", 100, "later snapshot")),
            vote("alice", 1, proposal(10, "Root", 100, "earliest snapshot")),
            vote("alice", 2, proposal(11, "Treasurer", 110, "other")),
            Vote {
                proposal: None,
                ..vote("carol", 0, proposal(12, "Root", 120, "missing"))
            },
        ];

        let referenda = dedup_referenda(votes);
        assert_eq!(referenda.keys().copied().collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(
            referenda[&10].description.as_deref(),
            Some("earliest snapshot")
        );
    }

    #[test]
    fn dedup_is_independent_of_input_order() {
        let votes = vec![
            vote("bob", 3, proposal(10, "Root", 100, "b")),
            vote("alice", 3, proposal(10, "Root", 100, "a")),
        ];
        let mut reversed = votes.clone();
        reversed.reverse();

        assert_eq!(dedup_referenda(votes), dedup_referenda(reversed));
    }

    fn cast_at(voter: &str, minute: u32, block: u64, proposal: Referendum) -> Vote {
        Vote {
            created_at_block: Some(block),
            ..vote(voter, minute, proposal)
        }
    }

    fn window_cohort() -> Cohort {
        let delegate = |address: &str| Delegate {
            address: address.to_owned(),
            delegate_type: DelegateType::Dao,
            name: None,
            start_block: 1_000,
            end_block: None,
        };
        Cohort {
            index: 2,
            network: "polkadot".to_owned(),
            name: None,
            start_block: 1_000,
            end_block: Some(2_000),
            start_time: None,
            end_time: Utc.with_ymd_and_hms(2024, 2, 1, 0, 30, 0).single(),
            tracks: Vec::new(),
            delegates: vec![delegate("alice"), delegate("bob")],
        }
    }

    async fn resolve(votes: Vec<Vote>) -> ResolvedReferenda {
        let source = MockGovernanceSource::new(votes);
        resolve_cohort_referenda(
            &source,
            &window_cohort(),
            &TrackFilter::unrestricted(),
            &AnalysisSettings::default(),
        )
        .await
        .expect("resolve referenda")
    }

    #[tokio::test]
    async fn referenda_created_outside_the_block_window_are_dropped() {
        let undated = Referendum {
            created_at_block: None,
            ..proposal(23, "Root", 0, "no creation block")
        };
        let votes = vec![
            cast_at("alice", 1, 1_050, proposal(20, "Root", 900, "before start")),
            cast_at("alice", 2, 1_990, proposal(21, "Root", 2_100, "after end")),
            cast_at("bob", 3, 1_500, proposal(22, "Root", 1_400, "inside")),
            cast_at("bob", 4, 1_600, undated),
        ];

        let resolved = resolve(votes).await;
        assert_eq!(
            resolved.referenda.keys().copied().collect::<Vec<_>>(),
            vec![22, 23]
        );
        assert_eq!(resolved.end_block, 2_000);
    }

    #[tokio::test]
    async fn votes_after_cohort_end_time_do_not_add_referenda() {
        let votes = vec![
            cast_at("alice", 10, 1_200, proposal(30, "Root", 1_100, "counted")),
            cast_at("bob", 45, 1_900, proposal(31, "Root", 1_150, "late only")),
            cast_at("alice", 50, 1_950, proposal(30, "Root", 1_100, "counted")),
        ];

        let resolved = resolve(votes).await;
        assert_eq!(resolved.referenda.keys().copied().collect::<Vec<_>>(), vec![30]);
    }
}
