//! Agent configuration
//!
//! Everything is read from the environment once, validated, and then handed
//! to constructors explicitly. Nothing downstream reads the environment.

use std::path::PathBuf;
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::amount::{TrackedAssets, FUJI_USDC, FUJI_WAVAX};
use crate::error::ConfigError;
use crate::market::MAX_CACHE_TTL;

pub const DEFAULT_RPC_URL: &str = "https://api.avax-test.network/ext/bc/C/rpc";
pub const DEFAULT_CHAIN_ID: u64 = 43113;
pub const DEFAULT_TREASURY_VAULT: &str = "0x565435bAf0C6A9E06BE4e7F00fE08C95d36F247b";
pub const DEFAULT_ACTION_EXECUTOR: &str = "0x4DabF129f9175a84D0E6caD48d14Be65bA5910F5";
pub const DEFAULT_RISK_PARAMETERS: &str = "0xEC85cC46c6C514a6e05361f682c884d30d0cc9D3";
pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_HF_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_HF_MODEL: &str = "HuggingFaceH4/zephyr-7b-beta";

/// Complete agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub chain: ChainConfig,
    pub market: MarketConfig,
    pub narrative: NarrativeConfig,
    pub policy: RiskPolicy,
    pub telemetry: TelemetryConfig,
    pub runner: RunnerConfig,
}

/// Chain endpoints, contract addresses and signing identity
#[derive(Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Hex-encoded secp256k1 key; `None` disables submission
    pub private_key: Option<String>,
    pub treasury_vault: Address,
    pub action_executor: Address,
    pub risk_parameters: Address,
    pub assets: TrackedAssets,
    pub read_timeout: Duration,
    /// Bound on signing and broadcasting one transaction
    pub send_timeout: Duration,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl std::fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("treasury_vault", &self.treasury_vault)
            .field("action_executor", &self.action_executor)
            .field("risk_parameters", &self.risk_parameters)
            .field("assets", &self.assets)
            .field("read_timeout", &self.read_timeout)
            .field("send_timeout", &self.send_timeout)
            .field("receipt_timeout", &self.receipt_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COINGECKO_URL.to_string(),
            api_key: None,
            cache_ttl: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct NarrativeConfig {
    pub base_url: String,
    pub model: String,
    /// Without a token the no-op narrator is used
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for NarrativeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HF_URL.to_string(),
            model: DEFAULT_HF_MODEL.to_string(),
            access_token: None,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Off-chain constants used by the risk evaluator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Fixed monthly spend used to estimate runway
    pub monthly_burn_usd: f64,
    /// Volatile exposure above this is over-weight
    pub max_volatile_exposure_pct: f64,
    /// Volatile exposure below this is under-weight
    pub min_volatile_exposure_pct: f64,
    /// Under-weight is only flagged above this treasury value
    pub min_value_for_exposure_usd: f64,
    /// Treasury value below this always needs a top-up
    pub absolute_floor_usd: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            monthly_burn_usd: 1000.0,
            max_volatile_exposure_pct: 70.0,
            min_volatile_exposure_pct: 30.0,
            min_value_for_exposure_usd: 10.0,
            absolute_floor_usd: 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// JSON activity file; `None` keeps the log in memory only
    pub activity_file: Option<PathBuf>,
    pub capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            activity_file: Some(PathBuf::from("store/activity.json")),
            capacity: crate::telemetry::MAX_ACTIVITY_ENTRIES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub cycle_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(300),
        }
    }
}

impl ChainConfig {
    /// Fuji defaults with no signing key
    pub fn fuji() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            private_key: None,
            treasury_vault: DEFAULT_TREASURY_VAULT.parse().unwrap_or_default(),
            action_executor: DEFAULT_ACTION_EXECUTOR.parse().unwrap_or_default(),
            risk_parameters: DEFAULT_RISK_PARAMETERS.parse().unwrap_or_default(),
            assets: TrackedAssets::default(),
            read_timeout: Duration::from_secs(15),
            send_timeout: Duration::from_secs(30),
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_secs(2),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let volatile = parse_address(&get, "VOLATILE_TOKEN_ADDRESS", FUJI_WAVAX)?;
        let stable = parse_address(&get, "STABLE_TOKEN_ADDRESS", FUJI_USDC)?;

        let chain = ChainConfig {
            rpc_url: get("AGENT_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            chain_id: parse_or(&get, "AGENT_CHAIN_ID", DEFAULT_CHAIN_ID)?,
            private_key: get("AGENT_PRIVATE_KEY"),
            treasury_vault: parse_address(
                &get,
                "TREASURY_VAULT_ADDRESS",
                DEFAULT_TREASURY_VAULT,
            )?,
            action_executor: parse_address(
                &get,
                "ACTION_EXECUTOR_ADDRESS",
                DEFAULT_ACTION_EXECUTOR,
            )?,
            risk_parameters: parse_address(
                &get,
                "RISK_PARAMETERS_ADDRESS",
                DEFAULT_RISK_PARAMETERS,
            )?,
            assets: TrackedAssets::new(volatile, stable),
            read_timeout: Duration::from_secs(parse_or(&get, "CHAIN_READ_TIMEOUT_SECS", 15)?),
            send_timeout: Duration::from_secs(parse_or(&get, "CHAIN_SEND_TIMEOUT_SECS", 30)?),
            receipt_timeout: Duration::from_secs(parse_or(&get, "RECEIPT_TIMEOUT_SECS", 120)?),
            receipt_poll_interval: Duration::from_secs(2),
        };

        let cache_ttl = Duration::from_secs(parse_or(&get, "MARKET_CACHE_TTL_SECS", 60)?);
        if cache_ttl > MAX_CACHE_TTL {
            return Err(ConfigError::InvalidValue {
                key: "MARKET_CACHE_TTL_SECS".to_string(),
                message: format!("must be at most {}", MAX_CACHE_TTL.as_secs()),
            });
        }

        let market = MarketConfig {
            base_url: get("COINGECKO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_COINGECKO_URL.to_string()),
            api_key: get("COINGECKO_API_KEY"),
            cache_ttl,
            request_timeout: Duration::from_secs(parse_or(&get, "MARKET_TIMEOUT_SECS", 10)?),
        };

        let narrative = NarrativeConfig {
            base_url: get("HF_BASE_URL").unwrap_or_else(|| DEFAULT_HF_URL.to_string()),
            model: get("HF_MODEL").unwrap_or_else(|| DEFAULT_HF_MODEL.to_string()),
            access_token: get("HF_ACCESS_TOKEN"),
            timeout: Duration::from_secs(parse_or(&get, "NARRATIVE_TIMEOUT_SECS", 20)?),
        };

        let monthly_burn_usd: f64 = parse_or(&get, "AGENT_MONTHLY_BURN_USD", 1000.0)?;
        if !monthly_burn_usd.is_finite() || monthly_burn_usd < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "AGENT_MONTHLY_BURN_USD".to_string(),
                message: "must be a non-negative number".to_string(),
            });
        }
        let policy = RiskPolicy {
            monthly_burn_usd,
            ..RiskPolicy::default()
        };

        let telemetry = TelemetryConfig {
            activity_file: Some(
                get("AGENT_ACTIVITY_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("store/activity.json")),
            ),
            capacity: crate::telemetry::MAX_ACTIVITY_ENTRIES,
        };

        let cycle_secs: u64 = parse_or(&get, "AGENT_CYCLE_INTERVAL_SECS", 300)?;
        let runner = RunnerConfig {
            cycle_interval: Duration::from_secs(cycle_secs.max(1)),
        };

        Ok(Self {
            chain,
            market,
            narrative,
            policy,
            telemetry,
            runner,
        })
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_address<G>(get: &G, key: &str, default: &str) -> Result<Address, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    let hex = raw.strip_prefix("0x").unwrap_or(&raw);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidAddress {
            key: key.to_string(),
            value: raw,
        });
    }
    raw.parse::<Address>().map_err(|_| ConfigError::InvalidAddress {
        key: key.to_string(),
        value: raw.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.chain.chain_id, 43113);
        assert!(config.chain.private_key.is_none());
        assert_eq!(config.market.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.policy.monthly_burn_usd, 1000.0);
        assert!(config.narrative.access_token.is_none());
        assert_eq!(
            config.telemetry.activity_file,
            Some(PathBuf::from("store/activity.json"))
        );
    }

    #[test]
    fn test_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("AGENT_CHAIN_ID", "43114"),
            ("AGENT_MONTHLY_BURN_USD", "2500.5"),
            ("MARKET_CACHE_TTL_SECS", "5"),
            ("HF_ACCESS_TOKEN", "hf_token"),
            ("AGENT_PRIVATE_KEY", "  "),
        ]))
        .unwrap();
        assert_eq!(config.chain.chain_id, 43114);
        assert_eq!(config.policy.monthly_burn_usd, 2500.5);
        assert_eq!(config.market.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.narrative.access_token.as_deref(), Some("hf_token"));
        // Blank values count as unset
        assert!(config.chain.private_key.is_none());
    }

    fn load(pairs: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
        AgentConfig::from_lookup(lookup(pairs))
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[("AGENT_CHAIN_ID", "fuji")]).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "AGENT_CHAIN_ID")
        );

        let err = load(&[("TREASURY_VAULT_ADDRESS", "0x1234")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress { .. }));

        let err = load(&[("AGENT_MONTHLY_BURN_USD", "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_cache_ttl_upper_bound() {
        let err = load(&[("MARKET_CACHE_TTL_SECS", "18446744073709551615")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "MARKET_CACHE_TTL_SECS"
        ));

        let config = load(&[("MARKET_CACHE_TTL_SECS", "86400")]).unwrap();
        assert_eq!(config.market.cache_ttl, MAX_CACHE_TTL);
    }

    #[test]
    fn test_send_timeout() {
        assert_eq!(ChainConfig::fuji().send_timeout, Duration::from_secs(30));
        let config = load(&[("CHAIN_SEND_TIMEOUT_SECS", "5")]).unwrap();
        assert_eq!(config.chain.send_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut chain = ChainConfig::fuji();
        chain.private_key = Some("0xdeadbeef".to_string());
        let rendered = format!("{:?}", chain);
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("<redacted>"));
    }
}
