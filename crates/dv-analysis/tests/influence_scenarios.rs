mod common;

use std::sync::Arc;

use anyhow::Result;
use dv_analysis::{AnalysisSettings, DvAnalyticsEngine, Influence, VoteCell};
use dv_core::{ReferendumStatus, VoteDecision, VotingPower};
use dv_source::MockGovernanceSource;

use common::{
    DAO_ALPHA, DAO_SILENT, GUARDIAN_BETA, NETWORK, REF_APPROVED, REF_NO_IMPACT, REF_REJECTED,
    cohort, init_tracing, referendum, scenario_source, scenario_votes, vote,
};

fn uncached(source: MockGovernanceSource, settings: AnalysisSettings) -> DvAnalyticsEngine {
    DvAnalyticsEngine::new(Arc::new(source), None, settings)
}

#[tokio::test]
async fn counterfactual_outcomes_per_referendum() -> Result<()> {
    init_tracing();
    let engine = uncached(scenario_source(), AnalysisSettings::default());

    let report = engine.influence(&cohort(), None).await?;
    assert_eq!(report.network, NETWORK);
    assert_eq!(
        report.referenda.keys().copied().collect::<Vec<_>>(),
        vec![REF_NO_IMPACT, REF_APPROVED, REF_REJECTED]
    );

    let no_impact = &report.referenda[&REF_NO_IMPACT];
    assert_eq!(no_impact.dv_aye_total, VotingPower::from(15u64));
    assert_eq!(no_impact.aye_without_dv, VotingPower::from(45u64));
    assert_eq!(no_impact.nay_without_dv, VotingPower::from(40u64));
    assert!(no_impact.would_pass_without_dv);
    assert_eq!(no_impact.influence, Influence::NoImpact);
    assert_eq!(no_impact.dv_aye_share, 25.0);
    assert_eq!(no_impact.dv_total_share, 15.0);

    let approved = &report.referenda[&REF_APPROVED];
    assert_eq!(approved.aye_without_dv, VotingPower::from(35u64));
    assert!(!approved.would_pass_without_dv);
    assert_eq!(approved.influence, Influence::Approved);

    let rejected = &report.referenda[&REF_REJECTED];
    assert_eq!(rejected.dv_nay_total, VotingPower::from(45u64));
    assert_eq!(rejected.nay_without_dv, VotingPower::from(25u64));
    assert!(rejected.would_pass_without_dv);
    assert_eq!(rejected.influence, Influence::Rejected);

    assert_eq!(report.summary.total_referenda, 3);
    assert_eq!(report.summary.approved, 1);
    assert_eq!(report.summary.rejected, 1);
    assert_eq!(report.summary.no_impact, 1);
    assert_eq!(report.summary.degraded, 0);
    assert_eq!(
        report.summary.by_track.keys().cloned().collect::<Vec<_>>(),
        vec!["Root", "SmallSpender", "Treasurer"]
    );
    Ok(())
}

#[tokio::test]
async fn votes_after_cohort_end_are_ignored() -> Result<()> {
    let engine = uncached(scenario_source(), AnalysisSettings::default());

    let report = engine.influence(&cohort(), None).await?;
    let record = &report.referenda[&REF_NO_IMPACT];
    assert_eq!(record.dv_nay_total, VotingPower::zero());
    assert_eq!(record.voted_count, 2);
    assert_eq!(record.not_voted_count, 1);
    assert_eq!(record.delegates[DAO_SILENT].decision, VoteCell::Novote);
    assert_eq!(record.delegates[DAO_ALPHA].decision, VoteCell::Aye);
    assert_eq!(
        record.delegates[GUARDIAN_BETA].voting_power,
        VotingPower::from(5u64)
    );
    Ok(())
}

#[tokio::test]
async fn referendum_touched_only_after_cohort_end_is_out_of_scope() -> Result<()> {
    let late_only = referendum(104, "Root", ReferendumStatus::Approved, 80, 20, 1_850);
    let mut votes = scenario_votes();
    votes.push(vote(DAO_SILENT, &late_only, VoteDecision::Aye, 50, 29, 1_900));
    let engine = uncached(MockGovernanceSource::new(votes), AnalysisSettings::default());

    let stats = engine.delegates_with_stats(&cohort(), None).await?;
    assert_eq!(stats.referenda_count, 3);
    assert_eq!(stats.delegates[DAO_ALPHA].stats.eligible_referenda, 3);
    assert_eq!(stats.delegates[DAO_ALPHA].stats.participation, 100.0);

    let influence = engine.influence(&cohort(), None).await?;
    assert_eq!(
        influence.referenda.keys().copied().collect::<Vec<_>>(),
        vec![REF_NO_IMPACT, REF_APPROVED, REF_REJECTED]
    );

    let matrix = engine.voting_matrix(&cohort(), None).await?;
    assert_eq!(matrix.referenda, vec![REF_NO_IMPACT, REF_APPROVED, REF_REJECTED]);
    Ok(())
}

#[tokio::test]
async fn classification_never_contradicts_final_status() -> Result<()> {
    let engine = uncached(scenario_source(), AnalysisSettings::default());
    let report = engine.influence(&cohort(), None).await?;

    for record in report.referenda.values() {
        match record.influence {
            Influence::Approved => assert!(record.is_passed, "{}", record.index),
            Influence::Rejected => assert!(record.is_failed, "{}", record.index),
            Influence::NoImpact => {}
        }
    }
    Ok(())
}

#[tokio::test]
async fn explicit_track_filter_narrows_referenda() -> Result<()> {
    let engine = uncached(scenario_source(), AnalysisSettings::default());
    let tracks = vec!["root".to_owned()];

    let report = engine.influence(&cohort(), Some(&tracks)).await?;
    assert_eq!(
        report.referenda.keys().copied().collect::<Vec<_>>(),
        vec![REF_APPROVED]
    );
    assert_eq!(report.tracks, vec!["root"]);

    let mut scoped = cohort();
    scoped.tracks = vec!["Treasurer".to_owned()];
    let report = engine.influence(&scoped, None).await?;
    assert_eq!(
        report.referenda.keys().copied().collect::<Vec<_>>(),
        vec![REF_NO_IMPACT]
    );
    Ok(())
}

#[tokio::test]
async fn influence_is_deterministic_across_concurrency_and_page_size() -> Result<()> {
    let serial = uncached(
        scenario_source(),
        AnalysisSettings {
            concurrency: 1,
            ..AnalysisSettings::default()
        },
    );
    let paged = uncached(
        scenario_source(),
        AnalysisSettings {
            page_size: 2,
            concurrency: 8,
            ..AnalysisSettings::default()
        },
    );

    let first = serial.influence(&cohort(), None).await?;
    let second = paged.influence(&cohort(), None).await?;
    let again = paged.influence(&cohort(), None).await?;
    assert_eq!(first, second);
    assert_eq!(second, again);
    Ok(())
}

#[tokio::test]
async fn failed_referendum_fetch_degrades_only_that_record() -> Result<()> {
    init_tracing();
    let source =
        Arc::new(MockGovernanceSource::new(scenario_votes()).with_failing_referendum(REF_APPROVED));
    let engine = DvAnalyticsEngine::new(source.clone(), None, AnalysisSettings::default());

    let report = engine.influence(&cohort(), None).await?;
    assert_eq!(report.referenda.len(), 3);

    let degraded = &report.referenda[&REF_APPROVED];
    assert!(degraded.degraded);
    assert_eq!(degraded.influence, Influence::NoImpact);
    assert_eq!(degraded.dv_aye_total, VotingPower::zero());
    assert_eq!(degraded.aye_without_dv, VotingPower::from(60u64));

    assert!(!report.referenda[&REF_NO_IMPACT].degraded);
    assert_eq!(report.referenda[&REF_REJECTED].influence, Influence::Rejected);
    assert_eq!(report.summary.degraded, 1);
    assert_eq!(report.summary.approved, 0);
    Ok(())
}

#[tokio::test]
async fn influence_cap_limits_analyzed_referenda() -> Result<()> {
    let engine = uncached(
        scenario_source(),
        AnalysisSettings {
            max_influence_referenda: 2,
            ..AnalysisSettings::default()
        },
    );

    let report = engine.influence(&cohort(), None).await?;
    assert_eq!(
        report.referenda.keys().copied().collect::<Vec<_>>(),
        vec![REF_NO_IMPACT, REF_APPROVED]
    );
    Ok(())
}

#[tokio::test]
async fn ongoing_cohort_resolves_chain_head_once() -> Result<()> {
    let source =
        Arc::new(MockGovernanceSource::new(scenario_votes()).with_latest_block(NETWORK, 1_250));
    let engine = DvAnalyticsEngine::new(source.clone(), None, AnalysisSettings::default());
    let mut ongoing = cohort();
    ongoing.end_block = None;

    let resolved = engine
        .resolve_referenda(&ongoing, &dv_analysis::TrackFilter::unrestricted())
        .await?;
    assert_eq!(resolved.end_block, 1_250);
    assert_eq!(source.latest_block_calls(), 1);
    assert_eq!(
        resolved.referenda.keys().copied().collect::<Vec<_>>(),
        vec![REF_NO_IMPACT, REF_APPROVED]
    );
    Ok(())
}
