//! Risk evaluation: market-derived flags plus security-oracle and holder-analytics lookups.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::analyzer::types::{InfoTag, ParameterSet, RiskFlag, RiskFlagSet};
use crate::config::ScoringConfig;
use crate::sources::{is_burn_address, HolderAnalytics, SecurityAttributes, SecurityOracle};
use crate::types::Snapshot;

/// Tax fraction above which a token is rejected outright.
const CRITICAL_TAX: f64 = 0.50;
/// Tax fraction above which a token is flagged as high-tax.
const HIGH_TAX: f64 = 0.30;
/// Combined top-10 holder share above which supply is considered concentrated.
const MAX_TOP10_SHARE: f64 = 0.60;
/// A locked or burned LP holder must own more than this share of the pool.
const MIN_LOCKED_LP_SHARE: f64 = 0.50;
const MIN_LIQUIDITY_RATIO: f64 = 0.05;
const LIQUIDITY_RATIO_FLOOR_USD: f64 = 1000.0;

/// Everything the evaluator learned about one snapshot.
#[derive(Debug, Clone, Default)]
pub struct RiskAssessment {
    pub flags: RiskFlagSet,
    pub info_tags: Vec<InfoTag>,
    pub security: SecurityAttributes,
    /// Whether a single locked or burned holder controls most of the LP
    pub lp_locked: bool,
}

impl RiskAssessment {
    pub fn has_whale_data(&self) -> bool {
        self.info_tags.contains(&InfoTag::WhaleDataAvailable)
    }
}

pub struct RiskEvaluator {
    oracle: Arc<dyn SecurityOracle>,
    analytics: Option<Arc<dyn HolderAnalytics>>,
    config: ScoringConfig,
}

impl RiskEvaluator {
    pub fn new(
        oracle: Arc<dyn SecurityOracle>,
        analytics: Option<Arc<dyn HolderAnalytics>>,
        config: ScoringConfig,
    ) -> Self {
        Self { oracle, analytics, config }
    }

    /// Derive risk flags for `snapshot` and write them back onto it.
    ///
    /// The oracle and analytics lookups run concurrently. Both degrade to empty
    /// data on failure, in which case only the market-derived flags fire.
    #[instrument(skip_all, fields(pair = %snapshot.pair_address, chain = %snapshot.chain_id))]
    pub async fn evaluate(&self, snapshot: &mut Snapshot, params: &ParameterSet) -> RiskAssessment {
        let address = snapshot.base_token_address.as_str();
        let chain = snapshot.chain_id.as_str();

        let (security, transfers) = tokio::join!(self.oracle.check(address, chain), async {
            match &self.analytics {
                Some(analytics) => analytics.whale_activity(address, chain).await,
                None => Vec::new(),
            }
        });

        let mut flags = market_flags(params, &self.config);
        let lp_locked = lp_is_locked(&security);
        security_flags(&security, lp_locked, &mut flags);

        let mut info_tags = Vec::new();
        if !transfers.is_empty() {
            info_tags.push(InfoTag::WhaleDataAvailable);
        }

        debug!(flags = %flags, whale_transfers = transfers.len(), "Risk evaluation complete");

        snapshot.security_data = Some(security.clone());
        snapshot.security_flags = flags.as_slice().to_vec();

        RiskAssessment {
            flags,
            info_tags,
            security,
            lp_locked,
        }
    }
}

/// Flags derived from market data alone.
pub fn market_flags(params: &ParameterSet, config: &ScoringConfig) -> RiskFlagSet {
    let mut flags = RiskFlagSet::new();
    let liquidity = params.initial_liquidity;

    if liquidity < config.min_liquidity_usd {
        flags.insert(RiskFlag::CriticalLowLiquidity);
    }
    if params.liquidity_mcap_ratio < MIN_LIQUIDITY_RATIO && liquidity > LIQUIDITY_RATIO_FLOOR_USD {
        flags.insert(RiskFlag::LowLiquidityRatio);
    }
    flags
}

/// Flags derived from security-oracle attributes.
pub fn security_flags(security: &SecurityAttributes, lp_locked: bool, flags: &mut RiskFlagSet) {
    if security.honeypot == Some(true) {
        flags.insert(RiskFlag::ScamHoneypot);
    }

    let buy_tax = security.buy_tax.unwrap_or(0.0);
    let sell_tax = security.sell_tax.unwrap_or(0.0);
    if buy_tax > CRITICAL_TAX || sell_tax > CRITICAL_TAX {
        flags.insert(RiskFlag::CriticalHighTax);
    } else if buy_tax > HIGH_TAX || sell_tax > HIGH_TAX {
        flags.insert(RiskFlag::HighTax);
    }

    if security.owner_change_balance == Some(true) {
        flags.insert(RiskFlag::OwnerCanMint);
    }

    if security.top10_share() > MAX_TOP10_SHARE {
        flags.insert(RiskFlag::HighHolderConcentration);
    }

    if !security.lp_holders.is_empty() && !lp_locked {
        flags.insert(RiskFlag::LpNotLocked);
    }
}

/// True when one LP holder that is locked (or a burn address) holds more than
/// half of the pool tokens.
pub fn lp_is_locked(security: &SecurityAttributes) -> bool {
    security
        .lp_holders
        .iter()
        .any(|h| (h.is_locked || is_burn_address(&h.address)) && h.percent > MIN_LOCKED_LP_SHARE)
}
