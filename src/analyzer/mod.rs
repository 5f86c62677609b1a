//! Decision pipeline: parameter extraction → risk evaluation → checklist scoring → classification.

pub mod checklist;
pub mod classifier;
pub mod parameters;
pub mod risk;
pub mod types;

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::ScoringConfig;
use crate::sources::{HolderAnalytics, SecurityOracle};
use crate::types::Snapshot;
use risk::RiskEvaluator;

pub use risk::RiskAssessment;
pub use types::{
    Action, AnalysisResult, CheckOutcome, InfoTag, ParameterSet, RiskFlag, RiskFlagSet, RiskLevel, ScoreBreakdown,
};

/// Runs the full analysis pipeline for one snapshot.
pub struct ScoringEngine {
    evaluator: RiskEvaluator,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(
        oracle: Arc<dyn SecurityOracle>,
        analytics: Option<Arc<dyn HolderAnalytics>>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            evaluator: RiskEvaluator::new(oracle, analytics, config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Analyze one snapshot. Never fails; degraded inputs show up as missing
    /// flags or an error marker in the breakdown.
    #[instrument(skip_all, fields(pair = %snapshot.pair_address, symbol = %snapshot.base_token_symbol))]
    pub async fn analyze(&self, mut snapshot: Snapshot) -> AnalysisResult {
        let mut params = parameters::extract(&snapshot, Utc::now());

        let assessment = self.evaluator.evaluate(&mut snapshot, &params).await;
        parameters::enrich(
            &mut params,
            &assessment.security,
            assessment.lp_locked,
            assessment.has_whale_data(),
        );

        let mut breakdown = checklist::score(&snapshot, &params, &self.config);
        checklist::apply_penalties(&mut breakdown, &assessment.flags, &self.config);

        let (action, risk_level) = classifier::classify(breakdown.score, &assessment.flags, &self.config);
        let predicted_fdv = classifier::predicted_valuation(breakdown.score, snapshot.fdv);

        debug!(
            score = breakdown.score,
            passes = breakdown.checklist_passes,
            action = %action,
            risk = %risk_level,
            params = ?params.to_hashmap(),
            "Analysis complete"
        );

        AnalysisResult {
            snapshot,
            params,
            breakdown,
            risk_flags: assessment.flags,
            info_tags: assessment.info_tags,
            action,
            risk_level,
            predicted_fdv,
        }
    }
}
