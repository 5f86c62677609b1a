//! Core types for the analysis pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::Snapshot;

/// Derived metrics for one snapshot.
///
/// The market metrics come straight from the snapshot. The tokenomics fields start as
/// conservative stubs and are filled in from security-oracle data when it is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub token_age_minutes: f64,
    pub initial_liquidity: f64,
    pub liquidity_mcap_ratio: f64,
    pub chain: String,
    pub volume_h1: f64,
    pub buy_sell_ratio: f64,
    pub vol_liq_ratio: f64,
    pub price_change_h1: f64,
    pub tx_count: u64,

    // Tokenomics and holder stubs
    pub mint_disabled: bool,
    pub lp_locked: bool,
    pub is_proxy: bool,
    pub renounced: bool,
    /// Buy tax in percent (0-100)
    pub buy_tax_pct: f64,
    /// Sell tax in percent (0-100)
    pub sell_tax_pct: f64,
    /// Share of supply held by the top 10 holders, in percent
    pub top10_share_pct: f64,
    /// Share of supply held by the owner / deployer, as a fraction
    pub owner_balance: f64,
    pub holder_count: u64,
    pub whale_data_available: bool,
}

impl ParameterSet {
    /// Numeric view of the metrics, keyed by name (for logging and persistence).
    pub fn to_hashmap(&self) -> HashMap<String, f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        HashMap::from([
            ("token_age_minutes".to_string(), self.token_age_minutes),
            ("initial_liquidity".to_string(), self.initial_liquidity),
            ("liquidity_mcap_ratio".to_string(), self.liquidity_mcap_ratio),
            ("volume_h1".to_string(), self.volume_h1),
            ("buy_sell_ratio".to_string(), self.buy_sell_ratio),
            ("vol_liq_ratio".to_string(), self.vol_liq_ratio),
            ("price_change_h1".to_string(), self.price_change_h1),
            ("tx_count".to_string(), self.tx_count as f64),
            ("mint_disabled".to_string(), flag(self.mint_disabled)),
            ("lp_locked".to_string(), flag(self.lp_locked)),
            ("buy_tax_pct".to_string(), self.buy_tax_pct),
            ("sell_tax_pct".to_string(), self.sell_tax_pct),
            ("top10_share_pct".to_string(), self.top10_share_pct),
            ("holder_count".to_string(), self.holder_count as f64),
        ])
    }
}

/// A discrete risk condition derived from market and security data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFlag {
    CriticalLowLiquidity,
    LowLiquidityRatio,
    ScamHoneypot,
    CriticalHighTax,
    HighTax,
    OwnerCanMint,
    HighHolderConcentration,
    LpNotLocked,
}

impl RiskFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFlag::CriticalLowLiquidity => "CRITICAL_LOW_LIQUIDITY",
            RiskFlag::LowLiquidityRatio => "LOW_LIQUIDITY_RATIO",
            RiskFlag::ScamHoneypot => "SCAM_HONEYPOT",
            RiskFlag::CriticalHighTax => "CRITICAL_HIGH_TAX",
            RiskFlag::HighTax => "HIGH_TAX",
            RiskFlag::OwnerCanMint => "OWNER_CAN_MINT",
            RiskFlag::HighHolderConcentration => "HIGH_HOLDER_CONCENTRATION",
            RiskFlag::LpNotLocked => "LP_NOT_LOCKED",
        }
    }
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered set of risk flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskFlagSet(Vec<RiskFlag>);

impl RiskFlagSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a flag; returns false if it was already present.
    pub fn insert(&mut self, flag: RiskFlag) -> bool {
        if self.0.contains(&flag) {
            return false;
        }
        self.0.push(flag);
        true
    }

    pub fn contains(&self, flag: RiskFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RiskFlag> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[RiskFlag] {
        &self.0
    }
}

impl FromIterator<RiskFlag> for RiskFlagSet {
    fn from_iter<I: IntoIterator<Item = RiskFlag>>(iter: I) -> Self {
        let mut set = RiskFlagSet::new();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl fmt::Display for RiskFlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = self.0.iter().map(|flag| flag.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}

/// Informational, non-punitive tags. Kept apart from risk flags so they never
/// count toward risk severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InfoTag {
    WhaleDataAvailable,
}

/// Outcome of one named entry in a score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckOutcome {
    Passed,
    Failed,
    Scored(f64),
    Error(String),
}

impl CheckOutcome {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed
        }
    }

    /// Whether this entry counts as a positive contribution.
    pub fn is_positive(&self) -> bool {
        match self {
            CheckOutcome::Passed => true,
            CheckOutcome::Scored(v) => *v > 0.0,
            CheckOutcome::Failed | CheckOutcome::Error(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub name: String,
    pub outcome: CheckOutcome,
}

/// Named outcomes of every check and category, plus the aggregate results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub entries: Vec<BreakdownEntry>,
    pub checklist_passes: u32,
    /// Final score, 0-100 inclusive
    pub score: f64,
}

impl ScoreBreakdown {
    pub fn push(&mut self, name: impl Into<String>, outcome: CheckOutcome) {
        self.entries.push(BreakdownEntry {
            name: name.into(),
            outcome,
        });
    }

    pub fn get(&self, name: &str) -> Option<&CheckOutcome> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.outcome)
    }

    /// Names of checks that passed or categories that scored above zero.
    pub fn passed(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_positive())
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Names of checks that failed or categories that scored zero.
    pub fn failed(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| match e.outcome {
                CheckOutcome::Failed => true,
                CheckOutcome::Scored(v) => v == 0.0,
                _ => false,
            })
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn has_error(&self) -> bool {
        self.entries.iter().any(|e| matches!(e.outcome, CheckOutcome::Error(_)))
    }

    /// Breakdown carrying only an error marker.
    pub fn error(reason: impl Into<String>) -> Self {
        let mut breakdown = ScoreBreakdown::default();
        breakdown.push("ERROR", CheckOutcome::Error(reason.into()));
        breakdown
    }
}

/// Terminal action for an analyzed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Reject,
    Watchlist,
    Alert,
    HighPriority,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Reject => "REJECT",
            Action::Watchlist => "WATCHLIST",
            Action::Alert => "ALERT",
            Action::HighPriority => "HIGH_PRIORITY",
        }
    }

    /// Actions that trigger an alert and a paper-trade entry.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Action::Alert | Action::HighPriority)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of analyzing one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub snapshot: Snapshot,
    pub params: ParameterSet,
    pub breakdown: ScoreBreakdown,
    pub risk_flags: RiskFlagSet,
    pub info_tags: Vec<InfoTag>,
    pub action: Action,
    pub risk_level: RiskLevel,
    /// Score-tiered multiple of the current valuation
    pub predicted_fdv: f64,
}

impl AnalysisResult {
    pub fn score(&self) -> f64 {
        self.breakdown.score
    }

    /// Predicted valuation as a multiple of the current one (0 when unknown).
    pub fn predicted_multiple(&self) -> f64 {
        if self.snapshot.fdv > 0.0 {
            self.predicted_fdv / self.snapshot.fdv
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_flag_set_dedupes_and_keeps_order() {
        let mut flags = RiskFlagSet::new();
        assert!(flags.insert(RiskFlag::HighTax));
        assert!(flags.insert(RiskFlag::LpNotLocked));
        assert!(!flags.insert(RiskFlag::HighTax));

        assert_eq!(flags.as_slice(), &[RiskFlag::HighTax, RiskFlag::LpNotLocked]);
        assert_eq!(flags.to_string(), "HIGH_TAX, LP_NOT_LOCKED");
    }

    #[test]
    fn test_risk_flag_serializes_screaming_case() {
        let json = serde_json::to_string(&RiskFlag::OwnerCanMint).unwrap();
        assert_eq!(json, "\"OWNER_CAN_MINT\"");
    }

    #[test]
    fn test_breakdown_passed_and_failed() {
        let mut breakdown = ScoreBreakdown::default();
        breakdown.push("Liquidity Safe", CheckOutcome::Passed);
        breakdown.push("LP Locked", CheckOutcome::Failed);
        breakdown.push("liquidity_score", CheckOutcome::Scored(30.0));
        breakdown.push("tokenomics_score", CheckOutcome::Scored(0.0));

        assert_eq!(breakdown.passed(), vec!["Liquidity Safe", "liquidity_score"]);
        assert_eq!(breakdown.failed(), vec!["LP Locked", "tokenomics_score"]);
        assert!(!breakdown.has_error());
        assert!(ScoreBreakdown::error("boom").has_error());
    }
}
