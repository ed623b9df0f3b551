use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};
use dv_core::{ReferendumIndex, Vote};

/// Applies the shared counting rules: votes after `cutoff` are dropped and
/// only the most recent vote per key survives. Input is sorted first so ties
/// resolve the same way regardless of fetch order.
pub(crate) fn latest_votes_by<K, F>(
    votes: Vec<Vote>,
    cutoff: Option<DateTime<Utc>>,
    key: F,
) -> BTreeMap<K, Vote>
where
    K: Ord,
    F: Fn(&Vote) -> K,
{
    let mut votes = votes
        .into_iter()
        .filter(|vote| vote.is_counted_before(cutoff))
        .collect::<Vec<_>>();
    votes.sort_by(|left, right| {
        left.voter_address
            .cmp(&right.voter_address)
            .then(left.proposal_index.cmp(&right.proposal_index))
            .then(left.created_at.cmp(&right.created_at))
            .then(left.created_at_block.cmp(&right.created_at_block))
            .then(left.decision.as_str().cmp(right.decision.as_str()))
            .then(left.total_voting_power.cmp(&right.total_voting_power))
    });

    let mut latest = BTreeMap::new();
    for vote in votes {
        match latest.entry(key(&vote)) {
            Entry::Vacant(entry) => {
                entry.insert(vote);
            }
            Entry::Occupied(mut entry) => {
                if vote.created_at > entry.get().created_at {
                    entry.insert(vote);
                }
            }
        }
    }
    latest
}

/// One counted vote per referendum for a single voter.
pub(crate) fn latest_votes_by_referendum(
    votes: Vec<Vote>,
    address: &str,
    cutoff: Option<DateTime<Utc>>,
) -> BTreeMap<ReferendumIndex, Vote> {
    let address = address.trim();
    let own = votes
        .into_iter()
        .filter(|vote| vote.voter_address.trim() == address)
        .collect();
    latest_votes_by(own, cutoff, |vote| vote.proposal_index)
}

/// One counted vote per voter for a single referendum.
pub(crate) fn latest_votes_by_voter(
    votes: Vec<Vote>,
    index: ReferendumIndex,
    cutoff: Option<DateTime<Utc>>,
) -> BTreeMap<String, Vote> {
    let on_referendum = votes
        .into_iter()
        .filter(|vote| vote.proposal_index == index)
        .collect();
    latest_votes_by(on_referendum, cutoff, |vote| {
        vote.voter_address.trim().to_owned()
    })
}
