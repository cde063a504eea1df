//! On-chain collaborators and the chain state reader

pub mod evm;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::{from_raw_amount, TrackedAssets};
use crate::error::{ChainReadError, ChainWriteError};
use crate::types::{AssetBalance, ChainState, RiskParameters, TreasuryBalances};

pub use evm::{EvmChainReader, EvmChainWriter};

/// Upper bound for every basis-point value stored on-chain
pub const MAX_BPS: u32 = 10_000;

/// Read-only contract surface
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn risk_parameters(&self) -> Result<RiskParameters, ChainReadError>;

    /// Vault balance of `token` in raw units
    async fn balance_of(&self, token: Address) -> Result<u128, ChainReadError>;

    /// Native gas balance of an account, in wei
    async fn native_balance(&self, account: Address) -> Result<U256, ChainReadError>;
}

/// Arguments of `ActionExecutor.proposeAction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeActionCall {
    pub action_id: H256,
    pub action_type: String,
    pub token_from: Address,
    pub token_to: Address,
    pub amount: u128,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Signed transaction surface
#[async_trait]
pub trait ChainWriter: Send + Sync {
    fn signer_address(&self) -> Address;

    /// Sign and broadcast; returns the transaction hash
    async fn propose_action(&self, call: &ProposeActionCall) -> Result<H256, ChainWriteError>;

    /// Block until the transaction is mined
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptStatus, ChainWriteError>;
}

/// Reads risk configuration and both vault balances as one unit
pub struct ChainStateReader {
    client: Arc<dyn ChainReader>,
    assets: TrackedAssets,
    timeout: Duration,
}

impl ChainStateReader {
    pub fn new(client: Arc<dyn ChainReader>, assets: TrackedAssets, timeout: Duration) -> Self {
        Self {
            client,
            assets,
            timeout,
        }
    }

    /// Native gas balance under the same timeout as the state read
    pub async fn native_balance(&self, account: Address) -> Result<U256, ChainReadError> {
        tokio::time::timeout(self.timeout, self.client.native_balance(account))
            .await
            .map_err(|_| ChainReadError::Timeout(self.timeout.as_secs()))?
    }

    /// All three reads run concurrently; any failure fails the whole read
    pub async fn read_state(&self) -> Result<ChainState, ChainReadError> {
        let volatile = &self.assets.volatile;
        let stable = &self.assets.stable;

        let reads = async {
            tokio::try_join!(
                self.client.risk_parameters(),
                self.client.balance_of(volatile.address),
                self.client.balance_of(stable.address)
            )
        };

        let (risk_parameters, volatile_raw, stable_raw) =
            tokio::time::timeout(self.timeout, reads)
                .await
                .map_err(|_| ChainReadError::Timeout(self.timeout.as_secs()))??;

        check_bps("maxRebalanceBps", risk_parameters.max_rebalance_bps)?;
        check_bps("volatilityThresholdBps", risk_parameters.volatility_threshold_bps)?;

        let balances = TreasuryBalances {
            volatile: to_balance(&volatile.symbol, volatile_raw, volatile.decimals)?,
            stable: to_balance(&stable.symbol, stable_raw, stable.decimals)?,
        };

        debug!(
            "Chain state: {} {} / {} {}, params {:?}",
            balances.volatile.amount,
            volatile.symbol,
            balances.stable.amount,
            stable.symbol,
            risk_parameters
        );

        Ok(ChainState {
            risk_parameters,
            balances,
        })
    }
}

fn check_bps(field: &str, value: u32) -> Result<(), ChainReadError> {
    if value > MAX_BPS {
        return Err(ChainReadError::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn to_balance(symbol: &str, raw: u128, decimals: u32) -> Result<AssetBalance, ChainReadError> {
    let amount = from_raw_amount(raw, decimals).ok_or_else(|| ChainReadError::OutOfRange {
        field: format!("balanceOf({})", symbol),
        value: raw.to_string(),
    })?;
    Ok(AssetBalance { raw, amount })
}
