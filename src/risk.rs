//! Risk evaluator
//!
//! A pure function of chain state and market snapshots. Rules run in a
//! fixed order; each may raise the severity and append a breach reason.
//! The recommended action is last-writer-wins, so the runway and floor
//! rules override an earlier REBALANCE with TOP_UP.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::RiskPolicy;
use crate::types::{
    ChainState, MarketSnapshots, RecommendedAction, RiskAnalysis, RiskLevel, RiskMetrics,
};

/// Display name of the volatile asset in breach reasons and proposals
pub const VOLATILE_LABEL: &str = "AVAX";

/// Working state threaded through the rules
struct Verdict {
    level: RiskLevel,
    reasons: Vec<String>,
    action: RecommendedAction,
}

impl Verdict {
    fn escalate(&mut self, level: RiskLevel) {
        self.level = self.level.max(level);
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskEvaluator {
    policy: RiskPolicy,
}

impl RiskEvaluator {
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, state: &ChainState, market: &MarketSnapshots) -> RiskAnalysis {
        self.evaluate_at(state, market, Utc::now())
    }

    /// Same as [`evaluate`](Self::evaluate) with an explicit timestamp
    pub fn evaluate_at(
        &self,
        state: &ChainState,
        market: &MarketSnapshots,
        timestamp: DateTime<Utc>,
    ) -> RiskAnalysis {
        let metrics = self.metrics(state, market);
        let mut verdict = Verdict {
            level: RiskLevel::Low,
            reasons: Vec::new(),
            action: RecommendedAction::DoNothing,
        };

        self.volatility_rule(&metrics, &mut verdict);
        self.exposure_rule(&metrics, &mut verdict);
        self.runway_rule(state, &metrics, &mut verdict);
        self.floor_rule(&metrics, &mut verdict);

        RiskAnalysis {
            risk_level: verdict.level,
            breach_reasons: verdict.reasons,
            recommended_action: verdict.action,
            metrics,
            timestamp,
        }
    }

    fn metrics(&self, state: &ChainState, market: &MarketSnapshots) -> RiskMetrics {
        let volatile_value = usd_value(state.balances.volatile.amount, market.volatile.price);
        let stable_value = usd_value(state.balances.stable.amount, market.stable.price);
        let total_value_usd = volatile_value + stable_value;

        let (volatile_exposure_pct, stable_exposure_pct) = if total_value_usd > 0.0 {
            (
                volatile_value / total_value_usd * 100.0,
                stable_value / total_value_usd * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        let estimated_runway_months = if self.policy.monthly_burn_usd > 0.0 {
            total_value_usd / self.policy.monthly_burn_usd
        } else {
            f64::INFINITY
        };

        let params = &state.risk_parameters;
        RiskMetrics {
            total_value_usd,
            volatile_exposure_pct,
            stable_exposure_pct,
            volatility_score_pct: market.volatile.volatility_bps as f64 / 100.0,
            max_rebalance_pct: params.max_rebalance_bps as f64 / 100.0,
            volatility_threshold_pct: params.volatility_threshold_bps as f64 / 100.0,
            estimated_runway_months,
        }
    }

    fn volatility_rule(&self, metrics: &RiskMetrics, verdict: &mut Verdict) {
        if metrics.volatility_score_pct > metrics.volatility_threshold_pct {
            verdict.escalate(RiskLevel::High);
            verdict.reasons.push(format!(
                "Volatility ({:.2}%) exceeds threshold ({:.2}%)",
                metrics.volatility_score_pct, metrics.volatility_threshold_pct
            ));
            verdict.action = RecommendedAction::Rebalance;
        }
    }

    fn exposure_rule(&self, metrics: &RiskMetrics, verdict: &mut Verdict) {
        let exposure = metrics.volatile_exposure_pct;

        if exposure > self.policy.max_volatile_exposure_pct {
            // Over-weight on top of any other breach jumps straight to CRITICAL
            let level = if verdict.level == RiskLevel::Low {
                RiskLevel::Medium
            } else {
                RiskLevel::Critical
            };
            verdict.escalate(level);
            verdict.reasons.push(format!(
                "{} exposure ({:.1}%) critically high",
                VOLATILE_LABEL, exposure
            ));
            verdict.action = RecommendedAction::Rebalance;
        } else if exposure < self.policy.min_volatile_exposure_pct
            && metrics.total_value_usd > self.policy.min_value_for_exposure_usd
        {
            verdict.escalate(RiskLevel::Medium);
            verdict.reasons.push(format!(
                "{} exposure ({:.1}%) too low",
                VOLATILE_LABEL, exposure
            ));
            verdict.action = RecommendedAction::Rebalance;
        }
    }

    fn runway_rule(&self, state: &ChainState, metrics: &RiskMetrics, verdict: &mut Verdict) {
        let min_runway = state.risk_parameters.min_runway_months as f64;

        if metrics.estimated_runway_months < min_runway {
            verdict.escalate(RiskLevel::High);
            verdict.reasons.push(format!(
                "Runway ({:.1} months) below minimum ({} months)",
                metrics.estimated_runway_months, state.risk_parameters.min_runway_months
            ));
            verdict.action = RecommendedAction::TopUp;
        }
    }

    fn floor_rule(&self, metrics: &RiskMetrics, verdict: &mut Verdict) {
        if metrics.total_value_usd < self.policy.absolute_floor_usd {
            verdict.escalate(RiskLevel::High);
            verdict.reasons.push(format!(
                "Treasury value critical (< ${})",
                self.policy.absolute_floor_usd
            ));
            verdict.action = RecommendedAction::TopUp;
        }
    }
}

fn usd_value(amount: Decimal, price: Decimal) -> f64 {
    match amount.checked_mul(price) {
        Some(value) => value.to_f64().unwrap_or(0.0),
        None => amount.to_f64().unwrap_or(0.0) * price.to_f64().unwrap_or(0.0),
    }
}
