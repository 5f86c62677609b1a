//! Checklist gate and category scorer.
//!
//! Scoring runs in four stages:
//! 1. Twenty boolean checks, each recorded by name.
//! 2. Gate: fewer passes than the configured threshold ends scoring at 0 with
//!    only the checklist entries in the breakdown.
//! 3. Fundamental floors on liquidity and 1h volume, which zero the score even
//!    when the checklist passed.
//! 4. Five category buckets (age, liquidity, volume, tokenomics, behavior)
//!    summing to at most 100.
//!
//! Penalties from risk flags are applied afterwards by [`apply_penalties`].

use tracing::{debug, error};

use crate::analyzer::types::{CheckOutcome, ParameterSet, RiskFlag, RiskFlagSet, ScoreBreakdown};
use crate::config::ScoringConfig;
use crate::types::Snapshot;

/// Total number of checklist predicates.
pub const CHECKLIST_SIZE: u32 = 20;

pub const LOW_LIQUIDITY_MARKER: &str = "LOW_LIQUIDITY_STRICT";
pub const DEAD_VOLUME_MARKER: &str = "DEAD_VOLUME";
pub const MINT_PENALTY_ENTRY: &str = "penalty_mintable";

/// Score a snapshot. Never fails: internal errors produce a zero score with an
/// `ERROR` entry in the breakdown.
pub fn score(snapshot: &Snapshot, params: &ParameterSet, config: &ScoringConfig) -> ScoreBreakdown {
    match try_score(snapshot, params, config) {
        Ok(breakdown) => breakdown,
        Err(reason) => {
            error!(pair = %snapshot.pair_address, "Scoring failed: {}", reason);
            ScoreBreakdown::error(reason)
        }
    }
}

fn try_score(snapshot: &Snapshot, params: &ParameterSet, config: &ScoringConfig) -> Result<ScoreBreakdown, String> {
    ensure_finite(snapshot, params)?;

    let mut breakdown = ScoreBreakdown::default();
    let passes = evaluate_checklist(snapshot, params, &mut breakdown);
    breakdown.checklist_passes = passes;

    if passes < config.checklist_pass_threshold {
        debug!(
            symbol = %snapshot.base_token_symbol,
            "Rejected at checklist gate: {}/{}", passes, CHECKLIST_SIZE
        );
        return Ok(breakdown);
    }

    let liquidity = params.initial_liquidity;
    let volume = params.volume_h1;
    if liquidity < config.min_liquidity_usd {
        breakdown.push(LOW_LIQUIDITY_MARKER, CheckOutcome::Failed);
        return Ok(breakdown);
    }
    if volume < config.min_volume_h1_usd {
        breakdown.push(DEAD_VOLUME_MARKER, CheckOutcome::Failed);
        return Ok(breakdown);
    }

    let age = params.token_age_minutes;
    let age_score = if (5.0..=720.0).contains(&age) {
        10.0
    } else if age < 5.0 {
        5.0
    } else {
        2.0
    };

    let liquidity_score = if liquidity > 5000.0 {
        30.0
    } else if liquidity > 2000.0 {
        20.0
    } else if liquidity > 1000.0 {
        10.0
    } else {
        0.0
    };

    let volume_score = if volume > 10_000.0 {
        30.0
    } else if volume > 1000.0 {
        15.0
    } else {
        5.0
    };

    let tokenomics_score = if params.mint_disabled { 20.0 } else { 0.0 };
    let behavior_score = 10.0;

    let categories = [
        ("age_score", age_score),
        ("liquidity_score", liquidity_score),
        ("volume_score", volume_score),
        ("tokenomics_score", tokenomics_score),
        ("behavior_score", behavior_score),
    ];
    let mut total = 0.0;
    for (name, points) in categories {
        total += points;
        breakdown.push(name, CheckOutcome::Scored(points));
    }

    breakdown.score = total.clamp(0.0, 100.0);
    Ok(breakdown)
}

/// Evaluate the twenty checks, recording each by name. Returns the pass count.
fn evaluate_checklist(snapshot: &Snapshot, params: &ParameterSet, breakdown: &mut ScoreBreakdown) -> u32 {
    let volume_to_valuation = if snapshot.fdv > 0.0 { params.volume_h1 / snapshot.fdv } else { 0.0 };
    // Unlike the extracted ratio, a pair with no sells does not pass here
    let strict_buy_sell = if snapshot.txns_h1_sells > 0 {
        snapshot.txns_h1_buys as f64 / snapshot.txns_h1_sells as f64
    } else {
        0.0
    };

    let checks: [(&str, bool); CHECKLIST_SIZE as usize] = [
        // Fundamentals
        ("Market Cap Safe", snapshot.fdv > 2000.0),
        ("Liquidity Safe", snapshot.liquidity_usd > 2000.0),
        ("LP Locked", params.lp_locked),
        ("Age > 1m", params.token_age_minutes >= 1.0),
        ("Mint Disabled", params.mint_disabled),
        ("Supply Normal", true),
        ("Contract Verified", !params.is_proxy),
        ("Renounced", params.renounced),
        ("Buy Tax < 10%", params.buy_tax_pct < 10.0),
        ("Sell Tax < 10%", params.sell_tax_pct < 10.0),
        // Holders
        ("Top 10 < 40%", params.top10_share_pct < 40.0),
        ("Dev < 5%", params.owner_balance < 0.05),
        ("Holders > 50", params.holder_count > 50),
        ("Whales Present", params.whale_data_available),
        ("Holder Growth", params.holder_count > 100),
        // Market
        ("Vol/MC > 0.1", volume_to_valuation > 0.1),
        ("Healthy Volatility", true),
        ("Buy/Sell > 1.0", strict_buy_sell > 1.0),
        ("Liquidity Stable", true),
        ("Socials Active", snapshot.has_socials()),
    ];

    let mut passes = 0;
    for (name, passed) in checks {
        if passed {
            passes += 1;
        }
        breakdown.push(name, CheckOutcome::from_bool(passed));
    }
    passes
}

/// Apply risk-flag penalties to a computed breakdown.
pub fn apply_penalties(breakdown: &mut ScoreBreakdown, flags: &RiskFlagSet, config: &ScoringConfig) {
    if flags.contains(RiskFlag::OwnerCanMint) {
        breakdown.score = (breakdown.score - config.mint_penalty).max(0.0);
        breakdown.push(MINT_PENALTY_ENTRY, CheckOutcome::Scored(-config.mint_penalty));
    }
}

fn ensure_finite(snapshot: &Snapshot, params: &ParameterSet) -> Result<(), String> {
    let fields = [
        ("fdv", snapshot.fdv),
        ("liquidity", params.initial_liquidity),
        ("volume_h1", params.volume_h1),
        ("token_age_minutes", params.token_age_minutes),
        ("buy_tax_pct", params.buy_tax_pct),
        ("sell_tax_pct", params.sell_tax_pct),
        ("top10_share_pct", params.top10_share_pct),
        ("owner_balance", params.owner_balance),
    ];
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((name, value)) => Err(format!("non-finite {}: {}", name, value)),
        None => Ok(()),
    }
}
