//! Error types for the guardian agent
//!
//! Only `ChainReadError` (and anything unexpected) is allowed to reach the
//! runner's top-level handler. Everything else is absorbed where it happens
//! and surfaces as data.

/// Market data could not be fetched; always recovered by the snapshot provider
#[derive(Debug, thiserror::Error)]
pub enum MarketFetchError {
    #[error("Market API request failed: {0}")]
    Api(String),

    #[error("Market request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid market response: {0}")]
    InvalidResponse(String),

    #[error("Asset not found in market response: {0}")]
    AssetNotFound(String),
}

/// On-chain state could not be read; fatal for the current cycle
#[derive(Debug, thiserror::Error)]
pub enum ChainReadError {
    #[error("RPC call {call} failed: {message}")]
    Rpc { call: String, message: String },

    #[error("Chain read timed out after {0}s")]
    Timeout(u64),

    #[error("On-chain value {field} out of range: {value}")]
    OutOfRange { field: String, value: String },
}

/// Submission to the action executor contract failed
#[derive(Debug, thiserror::Error)]
pub enum ChainWriteError {
    #[error("Transaction submission failed: {0}")]
    Transport(String),

    #[error("Transaction submission timed out after {0}s")]
    SendTimeout(u64),

    #[error("Receipt lookup failed: {0}")]
    Receipt(String),

    #[error("Timed out waiting for receipt after {0}s")]
    ReceiptTimeout(u64),
}

/// Narrative backend failure; always replaced by the fallback text
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("Narrative request failed: {0}")]
    Request(String),

    #[error("Narrative backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed narrative response: {0}")]
    Malformed(String),
}

/// Invalid configuration detected at load or construction time
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid address for {key}: {value}")]
    InvalidAddress { key: String, value: String },

    #[error("Invalid agent private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid RPC url {url}: {message}")]
    InvalidRpcUrl { url: String, message: String },
}

/// Errors that escape to the runner boundary
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    ChainRead(#[from] ChainReadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
