//! Treasury Guardian
//!
//! Autonomous risk agent for an on-chain treasury vault: reads market data
//! and vault state, classifies risk, and proposes bounded rebalances to the
//! ActionExecutor contract.

pub mod amount;
pub mod chain;
pub mod config;
pub mod error;
pub mod executor;
pub mod market;
pub mod narrative;
pub mod proposal;
pub mod risk;
pub mod runner;
pub mod telemetry;
pub mod types;

// Re-export main types for convenience
pub use chain::{ChainReader, ChainStateReader, ChainWriter, ProposeActionCall, ReceiptStatus};
pub use config::{AgentConfig, ChainConfig, MarketConfig, NarrativeConfig, RiskPolicy};
pub use error::{AgentError, ChainReadError, ChainWriteError, ConfigError, MarketFetchError, Result};
pub use executor::ActionSubmitter;
pub use market::{MarketDataSource, MarketSnapshotProvider, PriceChange, SnapshotCache};
pub use narrative::{Narrator, NoopNarrator, FALLBACK_NARRATIVE};
pub use proposal::ProposalSynthesizer;
pub use risk::RiskEvaluator;
pub use runner::{Collaborators, GuardianAgent};
pub use telemetry::{ActivityLog, FileTelemetry, MemoryTelemetry, TelemetrySink};
pub use types::*;
