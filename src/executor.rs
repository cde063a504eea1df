//! Action submitter - sends a proposal to the ActionExecutor contract

use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, H256};
use rand::RngCore;
use serde_json::json;
use tracing::warn;

use crate::chain::{ChainWriter, ProposeActionCall, ReceiptStatus};
use crate::error::ChainWriteError;
use crate::telemetry::ActivityLog;
use crate::types::{ActionProposal, ActivityType, ExecutionResult};

pub const SIGNER_NOT_CONFIGURED: &str =
    "Agent wallet not configured (missing or invalid private key)";
pub const REVERTED: &str = "Transaction reverted on-chain";

pub struct ActionSubmitter {
    writer: Option<Arc<dyn ChainWriter>>,
    activity: ActivityLog,
    send_timeout: Duration,
}

impl ActionSubmitter {
    /// `writer` is `None` when no signing key is configured
    pub fn new(writer: Option<Arc<dyn ChainWriter>>, activity: ActivityLog) -> Self {
        Self {
            writer,
            activity,
            send_timeout: Duration::from_secs(30),
        }
    }

    /// Bound on a single `propose_action` call
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.writer.as_ref().map(|w| w.signer_address())
    }

    /// Never returns an error; every failure is reported in the result
    pub async fn submit(&self, proposal: &ActionProposal) -> ExecutionResult {
        let Some(writer) = self.writer.as_ref() else {
            self.activity.error(SIGNER_NOT_CONFIGURED, None).await;
            return ExecutionResult::failed(None, None, SIGNER_NOT_CONFIGURED);
        };

        let action_id = random_action_id();
        let call = ProposeActionCall {
            action_id,
            action_type: proposal.action_type.as_str().to_string(),
            token_from: proposal.token_from.unwrap_or_else(Address::zero),
            token_to: proposal.token_to.unwrap_or_else(Address::zero),
            amount: proposal.amount,
            reason: proposal.reason.clone(),
        };

        self.activity
            .info(
                format!("Submitting proposal: {}", call.action_type),
                serde_json::to_value(proposal).ok(),
            )
            .await;

        let sent = tokio::time::timeout(self.send_timeout, writer.propose_action(&call))
            .await
            .unwrap_or_else(|_| Err(ChainWriteError::SendTimeout(self.send_timeout.as_secs())));

        let tx_hash = match sent {
            Ok(hash) => hash,
            Err(e) => {
                let error = format!("Execution failed: {}", e);
                self.activity
                    .error(
                        "Proposal submission failed",
                        Some(json!({ "actionId": action_id, "error": e.to_string() })),
                    )
                    .await;
                return ExecutionResult::failed(Some(action_id), None, error);
            }
        };

        self.activity
            .log(
                ActivityType::Action,
                "Proposal submitted on-chain",
                Some(json!({ "txHash": tx_hash, "actionId": action_id })),
            )
            .await;

        match writer.wait_for_receipt(tx_hash).await {
            Ok(ReceiptStatus::Success) => {
                self.activity
                    .log(
                        ActivityType::Action,
                        "Proposal confirmed",
                        Some(json!({ "txHash": tx_hash, "actionId": action_id })),
                    )
                    .await;
                ExecutionResult {
                    success: true,
                    tx_hash: Some(tx_hash),
                    action_id: Some(action_id),
                    error: None,
                }
            }
            Ok(ReceiptStatus::Reverted) => {
                self.activity
                    .error(REVERTED, Some(json!({ "txHash": tx_hash, "actionId": action_id })))
                    .await;
                ExecutionResult::failed(Some(action_id), Some(tx_hash), REVERTED)
            }
            Err(e) => {
                warn!("No receipt for {:?}: {}", tx_hash, e);
                self.activity
                    .error(
                        "Proposal confirmation failed",
                        Some(json!({ "txHash": tx_hash, "error": e.to_string() })),
                    )
                    .await;
                let error = format!("Execution failed: {}", e);
                ExecutionResult::failed(Some(action_id), Some(tx_hash), error)
            }
        }
    }
}

/// Fresh random 32-byte id correlating a proposal with its on-chain record
pub fn random_action_id() -> H256 {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    H256::from(bytes)
}
