#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use dv_core::{
    Cohort, Delegate, DelegateType, Referendum, ReferendumStatus, Vote, VoteDecision, VoteMetrics,
    VotingPower,
};
use dv_source::MockGovernanceSource;

pub const NETWORK: &str = "polkadot";
pub const DAO_ALPHA: &str = "14dao-alpha";
pub const GUARDIAN_BETA: &str = "15guardian-beta";
pub const DAO_SILENT: &str = "16dao-silent";

/// Passed 60/40; the cohort contributed 15 aye.
pub const REF_NO_IMPACT: u32 = 101;
/// Passed 60/40; the cohort contributed 25 aye.
pub const REF_APPROVED: u32 = 102;
/// Rejected 30/70; the cohort contributed 45 nay.
pub const REF_REJECTED: u32 = 103;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("dv_analysis=debug")
        .try_init();
}

pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn delegate(address: &str, delegate_type: DelegateType) -> Delegate {
    Delegate {
        address: address.to_owned(),
        delegate_type,
        name: Some(address.trim_start_matches(char::is_numeric).to_owned()),
        start_block: 1_000,
        end_block: None,
    }
}

pub fn cohort() -> Cohort {
    Cohort {
        index: 5,
        network: NETWORK.to_owned(),
        name: Some("Cohort 5".to_owned()),
        start_block: 1_000,
        end_block: Some(2_000),
        start_time: Some(day(1)),
        end_time: Some(day(28)),
        tracks: Vec::new(),
        delegates: vec![
            delegate(DAO_ALPHA, DelegateType::Dao),
            delegate(GUARDIAN_BETA, DelegateType::Guardian),
            delegate(DAO_SILENT, DelegateType::Dao),
        ],
    }
}

pub fn referendum(
    index: u32,
    origin: &str,
    status: ReferendumStatus,
    aye: u64,
    nay: u64,
    created_block: u64,
) -> Referendum {
    Referendum {
        index,
        status,
        origin: origin.to_owned(),
        title: Some(format!("Referendum {index}")),
        description: None,
        proposer: None,
        created_at: Some(day(2)),
        created_at_block: Some(created_block),
        updated_at_block: Some(created_block + 50),
        status_history: Vec::new(),
        vote_metrics: VoteMetrics {
            aye: VotingPower::from(aye),
            nay: VotingPower::from(nay),
            ..VoteMetrics::default()
        },
    }
}

pub fn vote(
    voter: &str,
    proposal: &Referendum,
    decision: VoteDecision,
    power: u64,
    on_day: u32,
    block: u64,
) -> Vote {
    Vote {
        voter_address: voter.to_owned(),
        proposal_index: proposal.index,
        decision,
        total_voting_power: VotingPower::from(power),
        created_at: day(on_day),
        created_at_block: Some(block),
        proposal: Some(proposal.clone()),
    }
}

/// Three referenda covering the no-impact, approved and rejected outcomes,
/// plus a late vote by the silent delegate that lands after the cohort ends.
pub fn scenario_votes() -> Vec<Vote> {
    let no_impact = referendum(
        REF_NO_IMPACT,
        "Treasurer",
        ReferendumStatus::Executed,
        60,
        40,
        1_100,
    );
    let approved = referendum(REF_APPROVED, "Root", ReferendumStatus::Approved, 60, 40, 1_200);
    let rejected = referendum(
        REF_REJECTED,
        "SmallSpender",
        ReferendumStatus::Rejected,
        30,
        70,
        1_300,
    );

    vec![
        vote(DAO_ALPHA, &no_impact, VoteDecision::Aye, 10, 3, 1_110),
        vote(GUARDIAN_BETA, &no_impact, VoteDecision::Aye, 5, 3, 1_111),
        vote(DAO_ALPHA, &approved, VoteDecision::Aye, 20, 4, 1_210),
        vote(GUARDIAN_BETA, &approved, VoteDecision::Aye, 5, 4, 1_211),
        vote(DAO_ALPHA, &rejected, VoteDecision::Nay, 25, 5, 1_310),
        vote(GUARDIAN_BETA, &rejected, VoteDecision::Nay, 20, 5, 1_311),
        vote(DAO_SILENT, &no_impact, VoteDecision::Nay, 1_000, 29, 1_900),
    ]
}

pub fn scenario_source() -> MockGovernanceSource {
    MockGovernanceSource::new(scenario_votes())
}
