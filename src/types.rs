//! Core data model shared by every stage of a guardian cycle

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two assets the treasury tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetId {
    /// The volatile asset (WAVAX on Fuji)
    Volatile,
    /// The stable asset (USDC on Fuji)
    Stable,
}

impl AssetId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetId::Volatile => "volatile",
            AssetId::Stable => "stable",
        }
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Price and volatility observation for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub asset: AssetId,
    /// Price in USD
    pub price: Decimal,
    /// Absolute 24h change in basis points, capped at 10000
    pub volatility_bps: u32,
    pub observed_at: DateTime<Utc>,
}

/// Snapshots for both tracked assets, fetched independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshots {
    pub volatile: MarketSnapshot,
    pub stable: MarketSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Risk configuration stored in the RiskParameters contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskParameters {
    /// Ceiling on a single rebalance, as bps of the source balance (0-10000)
    pub max_rebalance_bps: u32,
    /// Volatility above which the treasury is at risk (0-10000)
    pub volatility_threshold_bps: u32,
    pub min_runway_months: u64,
}

/// A vault balance in raw units plus its decimal-adjusted amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    pub raw: u128,
    pub amount: Decimal,
}

/// Vault balances of the two tracked assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryBalances {
    pub volatile: AssetBalance,
    pub stable: AssetBalance,
}

impl TreasuryBalances {
    pub fn get(&self, asset: AssetId) -> &AssetBalance {
        match asset {
            AssetId::Volatile => &self.volatile,
            AssetId::Stable => &self.stable,
        }
    }
}

/// Freshly read on-chain state; never cached across cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainState {
    pub risk_parameters: RiskParameters,
    pub balances: TreasuryBalances,
}

/// Severity, ordered LOW < MEDIUM < HIGH < CRITICAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    DoNothing,
    Rebalance,
    /// External capital injection; never executed by the agent
    TopUp,
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendedAction::DoNothing => write!(f, "DO_NOTHING"),
            RecommendedAction::Rebalance => write!(f, "REBALANCE"),
            RecommendedAction::TopUp => write!(f, "TOP_UP"),
        }
    }
}

/// Portfolio metrics derived during evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub total_value_usd: f64,
    pub volatile_exposure_pct: f64,
    pub stable_exposure_pct: f64,
    pub volatility_score_pct: f64,
    pub max_rebalance_pct: f64,
    pub volatility_threshold_pct: f64,
    pub estimated_runway_months: f64,
}

/// Outcome of one risk evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub risk_level: RiskLevel,
    /// One entry per triggered rule, in rule order
    pub breach_reasons: Vec<String>,
    pub recommended_action: RecommendedAction,
    pub metrics: RiskMetrics,
    pub timestamp: DateTime<Utc>,
}

impl RiskAnalysis {
    /// LOW + DO_NOTHING is the terminal "nothing to do" state
    pub fn is_all_clear(&self) -> bool {
        self.risk_level == RiskLevel::Low
            && self.recommended_action == RecommendedAction::DoNothing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Rebalance,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Rebalance => "REBALANCE",
        }
    }
}

/// Bounded trade instruction synthesized from a REBALANCE recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProposal {
    pub action_type: ActionType,
    /// `None` is submitted as the zero address
    pub token_from: Option<Address>,
    pub token_to: Option<Address>,
    /// Raw amount in the source asset's smallest unit, always > 0
    pub amount: u128,
    pub reason: String,
}

/// Outcome of submitting a proposal on-chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    /// Present iff a transaction was sent
    pub tx_hash: Option<H256>,
    pub action_id: Option<H256>,
    /// Present iff `success` is false
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn failed(
        action_id: Option<H256>,
        tx_hash: Option<H256>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            tx_hash,
            action_id,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Info,
    Warning,
    Error,
    Action,
    Proposal,
    Narrative,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityType::Info => "INFO",
            ActivityType::Warning => "WARNING",
            ActivityType::Error => "ERROR",
            ActivityType::Action => "ACTION",
            ActivityType::Proposal => "PROPOSAL",
            ActivityType::Narrative => "NARRATIVE",
        };
        write!(f, "{}", s)
    }
}

/// One immutable activity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: ActivityType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ActivityLogEntry {
    pub fn new(
        entry_type: ActivityType,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            entry_type,
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    Success,
    NoAction,
    Failed,
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleStatus::Success => write!(f, "SUCCESS"),
            CycleStatus::NoAction => write!(f, "NO_ACTION"),
            CycleStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of a risk check or agent cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub cycle_id: Uuid,
    pub status: CycleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_analysis: Option<RiskAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<ActionProposal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Non-empty iff `status` is FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn new(cycle_id: Uuid, status: CycleStatus) -> Self {
        Self {
            cycle_id,
            status,
            risk_analysis: None,
            proposal: None,
            execution: None,
            narrative: None,
            error: None,
        }
    }

    pub fn failed(cycle_id: Uuid, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "Unknown failure".to_string();
        }
        Self {
            error: Some(error),
            ..Self::new(cycle_id, CycleStatus::Failed)
        }
    }
}

/// Agent wallet status reported by the `status` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub configured: bool,
    pub address: Option<Address>,
    /// Native gas balance in ether units
    pub native_balance: Option<String>,
    pub chain_id: u64,
}
