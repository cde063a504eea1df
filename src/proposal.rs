//! Proposal synthesizer - turns a REBALANCE recommendation into a bounded trade

use tracing::debug;

use crate::amount::TrackedAssets;
use crate::chain::MAX_BPS;
use crate::config::RiskPolicy;
use crate::risk::VOLATILE_LABEL;
use crate::telemetry::ActivityLog;
use crate::types::{
    ActionProposal, ActionType, ActivityType, AssetId, RecommendedAction, RiskAnalysis,
    TreasuryBalances,
};

const CAPPED_SUFFIX: &str = " (Capped by risk parameters)";

/// Share of the source balance moved by one rebalance, before capping
const REBALANCE_DIVISOR: u128 = 4;

pub struct ProposalSynthesizer {
    assets: TrackedAssets,
    policy: RiskPolicy,
    activity: ActivityLog,
}

impl ProposalSynthesizer {
    pub fn new(assets: TrackedAssets, policy: RiskPolicy, activity: ActivityLog) -> Self {
        Self {
            assets,
            policy,
            activity,
        }
    }

    /// `None` for DO_NOTHING, TOP_UP, or when the bounded amount is zero
    pub async fn synthesize(
        &self,
        analysis: &RiskAnalysis,
        balances: &TreasuryBalances,
    ) -> Option<ActionProposal> {
        if analysis.recommended_action != RecommendedAction::Rebalance {
            debug!("No proposal for {}", analysis.recommended_action);
            return None;
        }

        let metrics = &analysis.metrics;
        let volatility_breach = metrics.volatility_score_pct > metrics.volatility_threshold_pct;
        let overweight = metrics.volatile_exposure_pct > self.policy.max_volatile_exposure_pct;
        let underweight = metrics.volatile_exposure_pct < self.policy.min_volatile_exposure_pct;

        let (from, to, mut reason) = if volatility_breach || overweight {
            let reason = if volatility_breach {
                "High volatility detected - Reducing exposure".to_string()
            } else {
                format!("Rebalancing {} overweight", VOLATILE_LABEL)
            };
            (AssetId::Volatile, AssetId::Stable, reason)
        } else if underweight {
            (
                AssetId::Stable,
                AssetId::Volatile,
                format!("Rebalancing {} underweight", VOLATILE_LABEL),
            )
        } else {
            self.log_zero_amount().await;
            return None;
        };

        let max_rebalance_bps = (metrics.max_rebalance_pct * 100.0)
            .round()
            .clamp(0.0, MAX_BPS as f64) as u128;
        let (amount, capped) = bounded_amount(balances.get(from).raw, max_rebalance_bps);
        if capped {
            reason.push_str(CAPPED_SUFFIX);
        }

        if amount == 0 {
            self.log_zero_amount().await;
            return None;
        }

        let proposal = ActionProposal {
            action_type: ActionType::Rebalance,
            token_from: Some(self.assets.get(from).address),
            token_to: Some(self.assets.get(to).address),
            amount,
            reason,
        };

        self.activity
            .log(
                ActivityType::Proposal,
                format!("Generated proposal: {}", proposal.reason),
                serde_json::to_value(&proposal).ok(),
            )
            .await;

        Some(proposal)
    }

    async fn log_zero_amount(&self) {
        self.activity
            .info("Proposal generated but amount is 0 (likely empty vault)", None)
            .await;
    }
}

/// A quarter of `balance`, capped at `balance * bps / 10000`
///
/// Returns the amount and whether the cap applied.
pub fn bounded_amount(balance: u128, max_rebalance_bps: u128) -> (u128, bool) {
    let candidate = balance / REBALANCE_DIVISOR;
    let ceiling = balance
        .checked_mul(max_rebalance_bps)
        .map(|v| v / MAX_BPS as u128)
        .unwrap_or_else(|| balance / MAX_BPS as u128 * max_rebalance_bps);

    if candidate > ceiling {
        (ceiling, true)
    } else {
        (candidate, false)
    }
}
