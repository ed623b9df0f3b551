use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BlockNumber, ReferendumIndex, VotingPower};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum ReferendumStatus {
    Submitted,
    DecisionDepositPlaced,
    Deciding,
    ConfirmStarted,
    ConfirmAborted,
    Confirmed,
    Approved,
    Executed,
    ExecutionFailed,
    Rejected,
    TimedOut,
    Cancelled,
    Killed,
    Unknown,
}

impl ReferendumStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::DecisionDepositPlaced => "DecisionDepositPlaced",
            Self::Deciding => "Deciding",
            Self::ConfirmStarted => "ConfirmStarted",
            Self::ConfirmAborted => "ConfirmAborted",
            Self::Confirmed => "Confirmed",
            Self::Approved => "Approved",
            Self::Executed => "Executed",
            Self::ExecutionFailed => "ExecutionFailed",
            Self::Rejected => "Rejected",
            Self::TimedOut => "TimedOut",
            Self::Cancelled => "Cancelled",
            Self::Killed => "Killed",
            Self::Unknown => "Unknown",
        }
    }

    /// Final states a vote can be scored against.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            Self::Executed | Self::Approved | Self::Rejected | Self::TimedOut | Self::Cancelled
        )
    }

    pub fn is_passed(self) -> bool {
        matches!(self, Self::Executed | Self::Approved | Self::Confirmed)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::Rejected | Self::TimedOut | Self::Cancelled)
    }
}

impl From<String> for ReferendumStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for ReferendumStatus {
    fn from(value: &str) -> Self {
        match value.trim() {
            "Submitted" => Self::Submitted,
            "DecisionDepositPlaced" => Self::DecisionDepositPlaced,
            "Deciding" => Self::Deciding,
            "ConfirmStarted" => Self::ConfirmStarted,
            "ConfirmAborted" => Self::ConfirmAborted,
            "Confirmed" => Self::Confirmed,
            "Approved" => Self::Approved,
            "Executed" => Self::Executed,
            "ExecutionFailed" => Self::ExecutionFailed,
            "Rejected" => Self::Rejected,
            "TimedOut" => Self::TimedOut,
            "Cancelled" => Self::Cancelled,
            "Killed" => Self::Killed,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: ReferendumStatus,
    #[serde(default)]
    pub block: Option<BlockNumber>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VoteMetrics {
    #[serde(default)]
    pub aye: VotingPower,
    #[serde(default)]
    pub nay: VotingPower,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support: Option<VotingPower>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aye_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nay_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referendum {
    pub index: ReferendumIndex,
    pub status: ReferendumStatus,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at_block: Option<BlockNumber>,
    #[serde(default)]
    pub updated_at_block: Option<BlockNumber>,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(default)]
    pub vote_metrics: VoteMetrics,
}

impl Referendum {
    /// Trimmed projection handed to the analytics components.
    pub fn to_cohort_referendum(&self) -> CohortReferendum {
        CohortReferendum {
            index: self.index,
            status: self.status,
            origin: self.origin.clone(),
            description: self.description.clone().or_else(|| self.title.clone()),
            vote_metrics: self.vote_metrics.clone(),
            created_at_block: self.created_at_block,
            updated_at_block: self.updated_at_block,
            status_history: self.status_history.clone(),
        }
    }

    pub fn status_as_of(&self, cutoff: Option<DateTime<Utc>>) -> ReferendumStatus {
        status_as_of(self.status, &self.status_history, cutoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortReferendum {
    pub index: ReferendumIndex,
    pub status: ReferendumStatus,
    pub origin: String,
    pub description: Option<String>,
    pub vote_metrics: VoteMetrics,
    pub created_at_block: Option<BlockNumber>,
    pub updated_at_block: Option<BlockNumber>,
    pub status_history: Vec<StatusHistoryEntry>,
}

impl CohortReferendum {
    pub fn status_as_of(&self, cutoff: Option<DateTime<Utc>>) -> ReferendumStatus {
        status_as_of(self.status, &self.status_history, cutoff)
    }
}

/// Status in effect at `cutoff`: the latest history entry at or before it.
/// Falls back to `current` without a cutoff, without history, or when every
/// entry is later than the cutoff.
pub fn status_as_of(
    current: ReferendumStatus,
    history: &[StatusHistoryEntry],
    cutoff: Option<DateTime<Utc>>,
) -> ReferendumStatus {
    let Some(cutoff) = cutoff else {
        return current;
    };
    history
        .iter()
        .filter(|entry| entry.timestamp <= cutoff)
        .max_by_key(|entry| entry.timestamp)
        .map(|entry| entry.status)
        .unwrap_or(current)
}
