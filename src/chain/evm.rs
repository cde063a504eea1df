//! JSON-RPC implementations of the chain collaborators

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256, U64};
use tracing::{debug, info};

use super::{ChainReader, ChainWriter, ProposeActionCall, ReceiptStatus};
use crate::config::ChainConfig;
use crate::error::{ChainReadError, ChainWriteError, ConfigError};
use crate::types::RiskParameters;

abigen!(
    RiskParametersContract,
    r#"[
        function maxRebalanceBps() external view returns (uint256)
        function volatilityThresholdBps() external view returns (uint256)
        function minRunwayMonths() external view returns (uint256)
    ]"#
);

abigen!(
    TreasuryVaultContract,
    r#"[
        function balanceOf(address token) external view returns (uint256)
    ]"#
);

abigen!(
    ActionExecutorContract,
    r#"[
        function proposeAction(bytes32 actionId, string actionType, address tokenFrom, address tokenTo, uint256 amount, string reason) external
    ]"#
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

fn connect(rpc_url: &str) -> Result<Provider<Http>, ConfigError> {
    Provider::<Http>::try_from(rpc_url).map_err(|e| ConfigError::InvalidRpcUrl {
        url: rpc_url.to_string(),
        message: e.to_string(),
    })
}

fn rpc_error(call: &str, err: impl std::fmt::Display) -> ChainReadError {
    ChainReadError::Rpc {
        call: call.to_string(),
        message: err.to_string(),
    }
}

fn narrow<T: TryFrom<U256>>(field: &str, value: U256) -> Result<T, ChainReadError> {
    T::try_from(value).map_err(|_| ChainReadError::OutOfRange {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Read-only client for the RiskParameters and TreasuryVault contracts
pub struct EvmChainReader {
    provider: Arc<Provider<Http>>,
    risk_parameters: RiskParametersContract<Provider<Http>>,
    vault: TreasuryVaultContract<Provider<Http>>,
}

impl EvmChainReader {
    pub fn new(config: &ChainConfig) -> Result<Self, ConfigError> {
        let provider = Arc::new(connect(&config.rpc_url)?);

        Ok(Self {
            risk_parameters: RiskParametersContract::new(
                config.risk_parameters,
                Arc::clone(&provider),
            ),
            vault: TreasuryVaultContract::new(config.treasury_vault, Arc::clone(&provider)),
            provider,
        })
    }
}

#[async_trait]
impl ChainReader for EvmChainReader {
    async fn risk_parameters(&self) -> Result<RiskParameters, ChainReadError> {
        let max_rebalance = self.risk_parameters.max_rebalance_bps();
        let volatility_threshold = self.risk_parameters.volatility_threshold_bps();
        let min_runway = self.risk_parameters.min_runway_months();

        let (max_rebalance_bps, volatility_threshold_bps, min_runway_months) = tokio::try_join!(
            async {
                max_rebalance
                    .call()
                    .await
                    .map_err(|e| rpc_error("maxRebalanceBps", e))
            },
            async {
                volatility_threshold
                    .call()
                    .await
                    .map_err(|e| rpc_error("volatilityThresholdBps", e))
            },
            async {
                min_runway
                    .call()
                    .await
                    .map_err(|e| rpc_error("minRunwayMonths", e))
            }
        )?;

        Ok(RiskParameters {
            max_rebalance_bps: narrow("maxRebalanceBps", max_rebalance_bps)?,
            volatility_threshold_bps: narrow("volatilityThresholdBps", volatility_threshold_bps)?,
            min_runway_months: narrow("minRunwayMonths", min_runway_months)?,
        })
    }

    async fn balance_of(&self, token: Address) -> Result<u128, ChainReadError> {
        let raw = self
            .vault
            .balance_of(token)
            .call()
            .await
            .map_err(|e| rpc_error("balanceOf", e))?;
        narrow("balanceOf", raw)
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ChainReadError> {
        self.provider
            .get_balance(account, None)
            .await
            .map_err(|e| rpc_error("eth_getBalance", e))
    }
}

/// `0x` followed by 64 hex characters
pub fn validate_private_key(key: &str) -> Result<(), ConfigError> {
    let hex = key
        .strip_prefix("0x")
        .ok_or_else(|| ConfigError::InvalidPrivateKey("missing 0x prefix".to_string()))?;
    if hex.len() != 64 {
        return Err(ConfigError::InvalidPrivateKey(format!(
            "expected 64 hex characters, got {}",
            hex.len()
        )));
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidPrivateKey("non-hex characters".to_string()));
    }
    Ok(())
}

/// Signing client for the ActionExecutor contract
pub struct EvmChainWriter {
    client: Arc<SignerClient>,
    executor: ActionExecutorContract<SignerClient>,
    address: Address,
    send_timeout: Duration,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl EvmChainWriter {
    /// Validates the key once; a malformed key is a construction error
    pub fn new(config: &ChainConfig, private_key: &str) -> Result<Self, ConfigError> {
        validate_private_key(private_key)?;

        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))?
            .with_chain_id(config.chain_id);
        let address = wallet.address();

        let provider = connect(&config.rpc_url)?;
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let executor = ActionExecutorContract::new(config.action_executor, Arc::clone(&client));

        info!("Agent signer {:?} on chain {}", address, config.chain_id);

        Ok(Self {
            client,
            executor,
            address,
            send_timeout: config.send_timeout,
            receipt_timeout: config.receipt_timeout,
            poll_interval: config.receipt_poll_interval,
        })
    }

    /// `None` when no key is configured
    pub fn from_config(config: &ChainConfig) -> Result<Option<Self>, ConfigError> {
        config
            .private_key
            .as_deref()
            .map(|key| Self::new(config, key))
            .transpose()
    }
}

#[async_trait]
impl ChainWriter for EvmChainWriter {
    fn signer_address(&self) -> Address {
        self.address
    }

    async fn propose_action(&self, action: &ProposeActionCall) -> Result<H256, ChainWriteError> {
        let call = self.executor.propose_action(
            action.action_id.to_fixed_bytes(),
            action.action_type.clone(),
            action.token_from,
            action.token_to,
            U256::from(action.amount),
            action.reason.clone(),
        );

        let pending = tokio::time::timeout(self.send_timeout, call.send())
            .await
            .map_err(|_| ChainWriteError::SendTimeout(self.send_timeout.as_secs()))?
            .map_err(|e| ChainWriteError::Transport(e.to_string()))?;

        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptStatus, ChainWriteError> {
        let poll = async {
            let mut ticker = tokio::time::interval(self.poll_interval);
            loop {
                ticker.tick().await;
                match self.client.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => {
                        debug!("Receipt for {:?}: status {:?}", tx_hash, receipt.status);
                        return Ok(if receipt.status == Some(U64::from(1)) {
                            ReceiptStatus::Success
                        } else {
                            ReceiptStatus::Reverted
                        });
                    }
                    Ok(None) => continue,
                    Err(e) => return Err(ChainWriteError::Receipt(e.to_string())),
                }
            }
        };

        tokio::time::timeout(self.receipt_timeout, poll)
            .await
            .map_err(|_| ChainWriteError::ReceiptTimeout(self.receipt_timeout.as_secs()))?
    }
}
