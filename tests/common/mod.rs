//! Mock collaborators for driving the guardian without network access

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use rust_decimal::Decimal;

use treasury_guardian::amount::TrackedAssets;
use treasury_guardian::market::MemorySnapshotCache;
use treasury_guardian::{
    ActionProposal, AgentConfig, ChainReadError, ChainReader, ChainWriteError, ChainWriter,
    Collaborators, GuardianAgent, MarketDataSource, MarketFetchError, MarketSnapshots,
    MemoryTelemetry, Narrator, PriceChange, ProposeActionCall, ReceiptStatus, RiskAnalysis,
    RiskParameters, FALLBACK_NARRATIVE,
};

pub const WAVAX: u128 = 1_000_000_000_000_000_000;
pub const USDC: u128 = 1_000_000;

/// Market source answering from a fixed table, or failing every call
pub struct MockMarket {
    quotes: Mutex<HashMap<String, PriceChange>>,
    unreachable: AtomicBool,
    pub calls: AtomicUsize,
}

impl MockMarket {
    /// AVAX at `avax_price` with a `pct_change` 24h move, USDC flat at $1
    pub fn quoting(avax_price: i64, pct_change: f64) -> Self {
        let mut quotes = HashMap::new();
        quotes.insert(
            "avalanche-2".to_string(),
            PriceChange {
                usd_price: Decimal::from(avax_price),
                pct_24h_change: pct_change,
            },
        );
        quotes.insert(
            "usd-coin".to_string(),
            PriceChange {
                usd_price: Decimal::ONE,
                pct_24h_change: 0.0,
            },
        );
        Self {
            quotes: Mutex::new(quotes),
            unreachable: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        let market = Self::quoting(0, 0.0);
        market.unreachable.store(true, Ordering::SeqCst);
        market
    }
}

#[async_trait]
impl MarketDataSource for MockMarket {
    async fn price_and_change(&self, market_id: &str) -> Result<PriceChange, MarketFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(MarketFetchError::Api("connection refused".to_string()));
        }
        self.quotes
            .lock()
            .unwrap()
            .get(market_id)
            .cloned()
            .ok_or_else(|| MarketFetchError::AssetNotFound(market_id.to_string()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Vault and risk-parameter reads from fixed values
pub struct MockChain {
    pub params: RiskParameters,
    pub volatile_raw: u128,
    pub stable_raw: u128,
    pub fail: bool,
    pub native_wei: U256,
    /// Gas balance lookups never answer
    pub native_stalled: bool,
}

impl MockChain {
    pub fn with_balances(volatile_raw: u128, stable_raw: u128) -> Self {
        Self {
            params: RiskParameters {
                max_rebalance_bps: 5000,
                volatility_threshold_bps: 1200,
                min_runway_months: 6,
            },
            volatile_raw,
            stable_raw,
            fail: false,
            native_wei: U256::exp10(18),
            native_stalled: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_balances(0, 0)
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn risk_parameters(&self) -> Result<RiskParameters, ChainReadError> {
        if self.fail {
            return Err(ChainReadError::Rpc {
                call: "maxRebalanceBps".to_string(),
                message: "node unavailable".to_string(),
            });
        }
        Ok(self.params)
    }

    async fn balance_of(&self, token: Address) -> Result<u128, ChainReadError> {
        let assets = TrackedAssets::default();
        if token == assets.volatile.address {
            Ok(self.volatile_raw)
        } else if token == assets.stable.address {
            Ok(self.stable_raw)
        } else {
            Ok(0)
        }
    }

    async fn native_balance(&self, _account: Address) -> Result<U256, ChainReadError> {
        if self.native_stalled {
            return std::future::pending().await;
        }
        Ok(self.native_wei)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum WriterOutcome {
    Confirmed,
    Reverted,
    TransportError,
    /// The RPC accepts the send and never answers
    Stalled,
}

/// Records every proposeAction call
pub struct MockWriter {
    outcome: WriterOutcome,
    pub calls: Mutex<Vec<ProposeActionCall>>,
}

impl MockWriter {
    pub fn new(outcome: WriterOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<ProposeActionCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainWriter for MockWriter {
    fn signer_address(&self) -> Address {
        Address::repeat_byte(0xaa)
    }

    async fn propose_action(&self, call: &ProposeActionCall) -> Result<H256, ChainWriteError> {
        self.calls.lock().unwrap().push(call.clone());
        match self.outcome {
            WriterOutcome::TransportError => {
                Err(ChainWriteError::Transport("nonce too low".to_string()))
            }
            WriterOutcome::Stalled => std::future::pending().await,
            _ => Ok(H256::repeat_byte(0x42)),
        }
    }

    async fn wait_for_receipt(&self, _tx_hash: H256) -> Result<ReceiptStatus, ChainWriteError> {
        match self.outcome {
            WriterOutcome::Reverted => Ok(ReceiptStatus::Reverted),
            _ => Ok(ReceiptStatus::Success),
        }
    }
}

/// Narrator returning a fixed text, or the fallback when `None`
pub struct ScriptedNarrator {
    text: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedNarrator {
    pub fn saying(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn broken() -> Self {
        Self {
            text: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn narrate(
        &self,
        _analysis: &RiskAnalysis,
        _proposal: Option<&ActionProposal>,
        _market: &MarketSnapshots,
    ) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .unwrap_or_else(|| FALLBACK_NARRATIVE.to_string())
    }
}

/// Defaults with every environment key unset
pub fn default_config() -> AgentConfig {
    AgentConfig::from_lookup(|_: &str| None).unwrap()
}

/// A guardian wired to mocks, with handles kept for assertions
pub struct Harness {
    pub agent: GuardianAgent,
    pub market: Arc<MockMarket>,
    pub writer: Option<Arc<MockWriter>>,
    pub narrator: Arc<ScriptedNarrator>,
}

impl Harness {
    pub fn new(market: MockMarket, chain: MockChain, writer: Option<MockWriter>) -> Self {
        Self::with_narrator(market, chain, writer, ScriptedNarrator::saying("Treasury is stable."))
    }

    pub fn with_narrator(
        market: MockMarket,
        chain: MockChain,
        writer: Option<MockWriter>,
        narrator: ScriptedNarrator,
    ) -> Self {
        Self::build(default_config(), market, chain, writer, narrator)
    }

    pub fn with_config(
        config: AgentConfig,
        market: MockMarket,
        chain: MockChain,
        writer: Option<MockWriter>,
    ) -> Self {
        let narrator = ScriptedNarrator::saying("Treasury is stable.");
        Self::build(config, market, chain, writer, narrator)
    }

    fn build(
        config: AgentConfig,
        market: MockMarket,
        chain: MockChain,
        writer: Option<MockWriter>,
        narrator: ScriptedNarrator,
    ) -> Self {
        let market = Arc::new(market);
        let writer = writer.map(Arc::new);
        let narrator = Arc::new(narrator);

        let agent = GuardianAgent::new(
            &config,
            Collaborators {
                market_source: market.clone(),
                snapshot_cache: Arc::new(MemorySnapshotCache::new()),
                chain_reader: Arc::new(chain),
                chain_writer: writer.clone().map(|w| w as Arc<dyn ChainWriter>),
                narrator: narrator.clone(),
                telemetry: Arc::new(MemoryTelemetry::new()),
            },
        );

        Self {
            agent,
            market,
            writer,
            narrator,
        }
    }
}
