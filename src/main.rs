//! Treasury Guardian - autonomous risk agent for the treasury vault
//!
//! 1. Fetches market snapshots for the tracked assets
//! 2. Reads risk parameters and vault balances on-chain
//! 3. Classifies risk and proposes a bounded rebalance
//! 4. Submits the proposal to the ActionExecutor contract

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use treasury_guardian::{AgentConfig, CycleStatus, GuardianAgent};

#[derive(Parser)]
#[command(name = "treasury-guardian", version, about = "Autonomous treasury risk agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate risk once without submitting anything
    Check,
    /// Run one full agent cycle
    Cycle,
    /// Run agent cycles periodically until interrupted
    Run {
        /// Seconds between cycles (overrides AGENT_CYCLE_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Print recent activity entries, newest first
    Activity {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show the agent signer and its gas balance
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AgentConfig::from_env().context("Invalid configuration")?;
    info!(
        "Chain {} via {}, vault {:?}",
        config.chain.chain_id, config.chain.rpc_url, config.chain.treasury_vault
    );

    let agent = GuardianAgent::from_config(&config).context("Failed to initialize agent")?;

    match cli.command {
        Command::Check => {
            let result = agent.run_risk_check().await;
            print_json(&result)?;
            exit_on_failure(result.status);
        }
        Command::Cycle => {
            let result = agent.run_agent_cycle().await;
            print_json(&result)?;
            exit_on_failure(result.status);
        }
        Command::Run { interval } => {
            let every = interval
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or(config.runner.cycle_interval);
            agent.run(every).await?;
        }
        Command::Activity { limit } => {
            print_json(&agent.recent_activity(limit).await)?;
        }
        Command::Status => {
            print_json(&agent.status().await?)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_on_failure(status: CycleStatus) {
    if status == CycleStatus::Failed {
        std::process::exit(1);
    }
}
