//! Classification: (score, risk flags) → (action, risk level).

use crate::analyzer::types::{Action, RiskFlag, RiskFlagSet, RiskLevel};
use crate::config::ScoringConfig;

/// Flags that force a REJECT, in precedence order. The first one present
/// determines the reported risk level.
pub const HARD_REJECT_RULES: &[(RiskFlag, RiskLevel)] = &[
    (RiskFlag::CriticalLowLiquidity, RiskLevel::Critical),
    (RiskFlag::ScamHoneypot, RiskLevel::Critical),
    (RiskFlag::CriticalHighTax, RiskLevel::Critical),
    (RiskFlag::HighTax, RiskLevel::High),
    (RiskFlag::OwnerCanMint, RiskLevel::High),
    (RiskFlag::LpNotLocked, RiskLevel::High),
    (RiskFlag::HighHolderConcentration, RiskLevel::High),
];

/// First hard-reject rule matched by `flags`, if any.
pub fn hard_reject(flags: &RiskFlagSet) -> Option<(RiskFlag, RiskLevel)> {
    HARD_REJECT_RULES
        .iter()
        .find(|(flag, _)| flags.contains(*flag))
        .copied()
}

/// Map a score and flag set to the terminal action and risk level.
pub fn classify(score: f64, flags: &RiskFlagSet, config: &ScoringConfig) -> (Action, RiskLevel) {
    if let Some((_, level)) = hard_reject(flags) {
        return (Action::Reject, level);
    }

    let level = match flags.len() {
        0 => RiskLevel::Low,
        1 => RiskLevel::Medium,
        _ => RiskLevel::High,
    };

    let action = if score >= config.high_priority_threshold {
        Action::HighPriority
    } else if score >= config.alert_threshold {
        Action::Alert
    } else if score >= config.watchlist_threshold {
        Action::Watchlist
    } else {
        Action::Reject
    };

    (action, level)
}

/// Score-tiered valuation multiple.
pub fn valuation_multiplier(score: f64) -> f64 {
    if score >= 90.0 {
        10.0
    } else if score >= 80.0 {
        5.0
    } else if score >= 60.0 {
        2.0
    } else {
        1.0
    }
}

/// Predicted valuation for a pair currently valued at `fdv`; 0 when unknown.
pub fn predicted_valuation(score: f64, fdv: f64) -> f64 {
    if fdv > 0.0 {
        fdv * valuation_multiplier(score)
    } else {
        0.0
    }
}
