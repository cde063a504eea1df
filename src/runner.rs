//! Guardian agent - cycle orchestration
//!
//! `run_risk_check` is the read-only pipeline (market, chain, evaluate).
//! `run_agent_cycle` continues into proposal, narrative and submission.
//! Neither returns an error: failures become a FAILED [`AgentResult`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chain::{ChainReader, ChainStateReader, ChainWriter, EvmChainReader, EvmChainWriter};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::executor::ActionSubmitter;
use crate::market::{
    CoinGeckoClient, MarketDataSource, MarketSnapshotProvider, MemorySnapshotCache, SnapshotCache,
};
use crate::narrative::{narrator_from_config, Narrator};
use crate::proposal::ProposalSynthesizer;
use crate::risk::{RiskEvaluator, VOLATILE_LABEL};
use crate::telemetry::{ActivityLog, FileTelemetry, MemoryTelemetry, TelemetrySink};
use crate::types::{
    ActivityLogEntry, ActivityType, AgentResult, AgentStatus, ChainState, CycleStatus,
    MarketSnapshots, RiskAnalysis,
};

/// External collaborators the agent is wired with
pub struct Collaborators {
    pub market_source: Arc<dyn MarketDataSource>,
    pub snapshot_cache: Arc<dyn SnapshotCache>,
    pub chain_reader: Arc<dyn ChainReader>,
    /// `None` when no signing key is configured
    pub chain_writer: Option<Arc<dyn ChainWriter>>,
    pub narrator: Arc<dyn Narrator>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

/// Everything one assessment produced
struct Assessment {
    market: MarketSnapshots,
    state: ChainState,
    analysis: RiskAnalysis,
}

pub struct GuardianAgent {
    market: MarketSnapshotProvider,
    chain: ChainStateReader,
    evaluator: RiskEvaluator,
    synthesizer: ProposalSynthesizer,
    narrator: Arc<dyn Narrator>,
    submitter: ActionSubmitter,
    activity: ActivityLog,
    chain_id: u64,
}

impl GuardianAgent {
    pub fn new(config: &AgentConfig, collaborators: Collaborators) -> Self {
        let activity = ActivityLog::new(collaborators.telemetry);
        let assets = config.chain.assets.clone();

        let market = MarketSnapshotProvider::new(
            collaborators.market_source,
            collaborators.snapshot_cache,
            assets.clone(),
            config.market.cache_ttl,
            activity.clone(),
        )
        .with_request_timeout(config.market.request_timeout);

        Self {
            market,
            chain: ChainStateReader::new(
                collaborators.chain_reader,
                assets.clone(),
                config.chain.read_timeout,
            ),
            evaluator: RiskEvaluator::new(config.policy),
            synthesizer: ProposalSynthesizer::new(assets, config.policy, activity.clone()),
            narrator: collaborators.narrator,
            submitter: ActionSubmitter::new(collaborators.chain_writer, activity.clone())
                .with_send_timeout(config.chain.send_timeout),
            activity,
            chain_id: config.chain.chain_id,
        }
    }

    /// Wire the production collaborators
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let market_source = CoinGeckoClient::new(&config.market)
            .map_err(|e| AgentError::Unexpected(e.to_string()))?;
        let chain_reader = EvmChainReader::new(&config.chain)?;
        let chain_writer = EvmChainWriter::from_config(&config.chain)?
            .map(|w| Arc::new(w) as Arc<dyn ChainWriter>);
        if chain_writer.is_none() {
            warn!("AGENT_PRIVATE_KEY not set, proposals will not be submitted");
        }

        let telemetry: Arc<dyn TelemetrySink> = match &config.telemetry.activity_file {
            Some(path) => Arc::new(FileTelemetry::with_capacity(path, config.telemetry.capacity)),
            None => Arc::new(MemoryTelemetry::with_capacity(config.telemetry.capacity)),
        };

        Ok(Self::new(
            config,
            Collaborators {
                market_source: Arc::new(market_source),
                snapshot_cache: Arc::new(MemorySnapshotCache::new()),
                chain_reader: Arc::new(chain_reader),
                chain_writer,
                narrator: narrator_from_config(&config.narrative),
                telemetry,
            },
        ))
    }

    /// Market, chain and evaluation only; never submits anything
    pub async fn run_risk_check(&self) -> AgentResult {
        let cycle_id = Uuid::new_v4();
        self.activity
            .info("Starting risk check", Some(json!({ "cycleId": cycle_id })))
            .await;

        match self.assess().await {
            Ok(assessment) => AgentResult {
                risk_analysis: Some(assessment.analysis),
                ..AgentResult::new(cycle_id, CycleStatus::Success)
            },
            Err(e) => self.fail(cycle_id, "Risk Check Failed", e).await,
        }
    }

    /// Full pipeline; at most one proposal is submitted
    pub async fn run_agent_cycle(&self) -> AgentResult {
        let cycle_id = Uuid::new_v4();
        let result = match self.cycle(cycle_id).await {
            Ok(result) => result,
            Err(e) => self.fail(cycle_id, "Agent Cycle Failed", e).await,
        };
        info!("Cycle {} finished: {}", cycle_id, result.status);
        result
    }

    async fn cycle(&self, cycle_id: Uuid) -> Result<AgentResult> {
        self.activity
            .info("Starting agent cycle", Some(json!({ "cycleId": cycle_id })))
            .await;

        let Assessment {
            market,
            state,
            analysis,
        } = self.assess().await?;

        if analysis.is_all_clear() {
            self.activity.info("Risk level LOW. No action needed.", None).await;
            return Ok(AgentResult {
                risk_analysis: Some(analysis),
                ..AgentResult::new(cycle_id, CycleStatus::NoAction)
            });
        }

        let proposal = self.synthesizer.synthesize(&analysis, &state.balances).await;

        let narrative = self
            .narrator
            .narrate(&analysis, proposal.as_ref(), &market)
            .await;
        self.activity
            .log(ActivityType::Narrative, narrative.clone(), None)
            .await;

        let Some(proposal) = proposal else {
            self.activity.info("No actionable proposal generated.", None).await;
            return Ok(AgentResult {
                risk_analysis: Some(analysis),
                narrative: Some(narrative),
                ..AgentResult::new(cycle_id, CycleStatus::NoAction)
            });
        };

        let execution = self.submitter.submit(&proposal).await;
        let status = if execution.success {
            CycleStatus::Success
        } else {
            CycleStatus::Failed
        };

        Ok(AgentResult {
            cycle_id,
            status,
            error: execution.error.clone(),
            risk_analysis: Some(analysis),
            proposal: Some(proposal),
            execution: Some(execution),
            narrative: Some(narrative),
        })
    }

    async fn assess(&self) -> Result<Assessment> {
        let market = self.market.get_all_snapshots().await;
        let state = self.chain.read_state().await?;
        let analysis = self.evaluator.evaluate(&state, &market);

        self.activity
            .info(
                format!("Risk evaluated: {}", analysis.risk_level),
                Some(json!({
                    "action": analysis.recommended_action,
                    "exposure": format!(
                        "{:.1}% {}",
                        analysis.metrics.volatile_exposure_pct, VOLATILE_LABEL
                    ),
                })),
            )
            .await;

        Ok(Assessment {
            market,
            state,
            analysis,
        })
    }

    async fn fail(&self, cycle_id: Uuid, context: &str, e: AgentError) -> AgentResult {
        self.activity
            .error(
                context,
                Some(json!({ "cycleId": cycle_id, "error": e.to_string() })),
            )
            .await;
        AgentResult::failed(cycle_id, e.to_string())
    }

    /// Signer address and native gas balance
    pub async fn status(&self) -> Result<AgentStatus> {
        let Some(address) = self.submitter.signer_address() else {
            return Ok(AgentStatus {
                configured: false,
                address: None,
                native_balance: None,
                chain_id: self.chain_id,
            });
        };

        let wei = self.chain.native_balance(address).await?;
        Ok(AgentStatus {
            configured: true,
            address: Some(address),
            native_balance: Some(ethers::utils::format_ether(wei)),
            chain_id: self.chain_id,
        })
    }

    pub async fn recent_activity(&self, limit: usize) -> Vec<ActivityLogEntry> {
        self.activity.read_recent(limit).await
    }

    /// Run agent cycles on a fixed interval until ctrl-c
    ///
    /// Cycles never overlap: a slow cycle delays the next tick.
    pub async fn run(&self, every: Duration) -> anyhow::Result<()> {
        info!("Guardian agent starting, cycle every {:?}", every);

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = self.run_agent_cycle().await;
                    match result.status {
                        CycleStatus::Failed => error!(
                            "Cycle {} failed: {}",
                            result.cycle_id,
                            result.error.as_deref().unwrap_or_default()
                        ),
                        status => debug!("Cycle {} status {}", result.cycle_id, status),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }
}
