//! End-to-end analysis: extraction, risk evaluation, checklist scoring and classification.

mod common;

use common::{clean_security, snapshot, FixedAnalytics, FixedOracle};
use pair_scout::analyzer::checklist::{CHECKLIST_SIZE, LOW_LIQUIDITY_MARKER, MINT_PENALTY_ENTRY};
use pair_scout::analyzer::{Action, CheckOutcome, InfoTag, RiskFlag, RiskLevel, ScoringEngine};
use pair_scout::config::ScoringConfig;
use pair_scout::sources::{HolderAnalytics, HolderEntry, SecurityAttributes};
use serde_json::json;
use std::sync::Arc;

fn engine(security: SecurityAttributes) -> ScoringEngine {
    ScoringEngine::new(Arc::new(FixedOracle(security)), None, ScoringConfig::default())
}

#[tokio::test]
async fn test_twelve_passes_rejects_with_checklist_only() {
    let mut snap = snapshot("0xthin", 0.01);
    snap.websites.clear();
    snap.socials.clear();
    snap.txns_h1_sells = 0;

    let result = engine(SecurityAttributes::default()).analyze(snap).await;

    assert_eq!(result.breakdown.checklist_passes, 12);
    assert_eq!(result.score(), 0.0);
    assert_eq!(result.action, Action::Reject);
    assert_eq!(result.breakdown.entries.len(), CHECKLIST_SIZE as usize);
    assert!(result
        .breakdown
        .entries
        .iter()
        .all(|e| matches!(e.outcome, CheckOutcome::Passed | CheckOutcome::Failed)));
}

#[tokio::test]
async fn test_clean_pair_is_high_priority() {
    let analytics: Arc<dyn HolderAnalytics> = Arc::new(FixedAnalytics(vec![json!({ "value": "1000000" })]));
    let engine = ScoringEngine::new(
        Arc::new(FixedOracle(clean_security())),
        Some(analytics),
        ScoringConfig::default(),
    );

    let result = engine.analyze(snapshot("0xclean", 0.01)).await;

    assert_eq!(result.breakdown.checklist_passes, 20);
    assert_eq!(result.score(), 100.0);
    assert_eq!(result.action, Action::HighPriority);
    assert_eq!(result.risk_level, RiskLevel::Low);
    assert!(result.risk_flags.is_empty());
    assert_eq!(result.info_tags, vec![InfoTag::WhaleDataAvailable]);
    assert_eq!(result.predicted_fdv, 10_000_000.0);
    assert_eq!(result.breakdown.get("LP Locked"), Some(&CheckOutcome::Passed));
    assert_eq!(result.breakdown.get("Whales Present"), Some(&CheckOutcome::Passed));

    // Evaluator writes its findings back onto the snapshot
    assert_eq!(result.snapshot.security_data.as_ref(), Some(&clean_security()));
    assert!(result.snapshot.security_flags.is_empty());
}

#[tokio::test]
async fn test_owner_mint_forces_reject_with_penalty() {
    let mut security = clean_security();
    security.owner_change_balance = Some(true);

    let result = engine(security).analyze(snapshot("0xmint", 0.01)).await;

    assert!(result.risk_flags.contains(RiskFlag::OwnerCanMint));
    assert_eq!(result.action, Action::Reject);
    assert_eq!(result.risk_level, RiskLevel::High);
    assert_eq!(result.score(), 50.0);
    assert_eq!(result.breakdown.get(MINT_PENALTY_ENTRY), Some(&CheckOutcome::Scored(-50.0)));
}

#[tokio::test]
async fn test_honeypot_is_critical() {
    let mut security = clean_security();
    security.honeypot = Some(true);
    security.sell_tax = Some(0.99);

    let result = engine(security).analyze(snapshot("0xtrap", 0.01)).await;

    assert_eq!(result.action, Action::Reject);
    assert_eq!(result.risk_level, RiskLevel::Critical);
    assert!(result.risk_flags.contains(RiskFlag::ScamHoneypot));
    assert!(result.risk_flags.contains(RiskFlag::CriticalHighTax));
    assert_eq!(
        result.snapshot.security_flags,
        vec![RiskFlag::ScamHoneypot, RiskFlag::CriticalHighTax]
    );
}

#[tokio::test]
async fn test_unlocked_lp_rejects() {
    let mut security = clean_security();
    security.lp_holders = vec![HolderEntry {
        address: "0xdeployer".to_string(),
        percent: 0.95,
        is_locked: false,
    }];

    let result = engine(security).analyze(snapshot("0xrug", 0.01)).await;

    assert!(result.risk_flags.contains(RiskFlag::LpNotLocked));
    assert_eq!(result.action, Action::Reject);
    assert_eq!(result.breakdown.get("LP Locked"), Some(&CheckOutcome::Failed));
}

#[tokio::test]
async fn test_low_liquidity_hits_floor_and_critical_flag() {
    let mut snap = snapshot("0xdust", 0.01);
    snap.liquidity_usd = 400.0;
    snap.fdv = 2500.0;

    let result = engine(clean_security()).analyze(snap).await;

    assert!(result.breakdown.checklist_passes >= 14);
    assert_eq!(result.score(), 0.0);
    assert_eq!(result.breakdown.get(LOW_LIQUIDITY_MARKER), Some(&CheckOutcome::Failed));
    assert!(result.risk_flags.contains(RiskFlag::CriticalLowLiquidity));
    assert_eq!(result.risk_level, RiskLevel::Critical);
}

#[tokio::test]
async fn test_oracle_outage_falls_back_to_stubs() {
    // Empty security data: stub tokenomics, no security flags
    let result = engine(SecurityAttributes::default()).analyze(snapshot("0xdark", 0.01)).await;

    assert_eq!(result.breakdown.checklist_passes, 14);
    assert!(result.risk_flags.is_empty());
    assert_eq!(result.breakdown.get("Mint Disabled"), Some(&CheckOutcome::Passed));
    assert_eq!(result.breakdown.get("Renounced"), Some(&CheckOutcome::Failed));
    assert!(result.info_tags.is_empty());
}
