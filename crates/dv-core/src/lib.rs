mod cohort;
mod power;
mod referendum;
mod vote;

pub use cohort::{Cohort, Delegate, DelegateType, DelegateWindow, normalize_network};
pub use power::{VotingPower, VotingPowerParseError};
pub use referendum::{
    CohortReferendum, Referendum, ReferendumStatus, StatusHistoryEntry, VoteMetrics,
    status_as_of,
};
pub use vote::{Vote, VoteDecision};

pub type ReferendumIndex = u32;
pub type BlockNumber = u64;
