use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BlockNumber, Referendum, ReferendumIndex, VotingPower};

/// Conviction vote direction. Anything the indexer reports beyond aye/nay
/// (split, split-abstain) is folded into `Abstain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum VoteDecision {
    Aye,
    Nay,
    Abstain,
}

impl VoteDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aye => "aye",
            Self::Nay => "nay",
            Self::Abstain => "abstain",
        }
    }
}

impl From<String> for VoteDecision {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for VoteDecision {
    fn from(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("aye") {
            Self::Aye
        } else if value.eq_ignore_ascii_case("nay") {
            Self::Nay
        } else {
            Self::Abstain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_address: String,
    pub proposal_index: ReferendumIndex,
    pub decision: VoteDecision,
    pub total_voting_power: VotingPower,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_block: Option<BlockNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<Referendum>,
}

impl Vote {
    /// Votes created after the cohort cutoff never count.
    pub fn is_counted_before(&self, cutoff: Option<DateTime<Utc>>) -> bool {
        cutoff.is_none_or(|cutoff| self.created_at <= cutoff)
    }
}
