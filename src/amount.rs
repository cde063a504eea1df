//! Token metadata and raw amount conversions

use ethers::types::Address;
use rust_decimal::Decimal;

use crate::types::AssetId;

/// Token metadata for a tracked asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
    pub decimals: u32,
    /// CoinGecko coin id used for market lookups
    pub market_id: String,
}

/// The volatile/stable pair the treasury holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAssets {
    pub volatile: TokenInfo,
    pub stable: TokenInfo,
}

/// WAVAX on Avalanche Fuji
pub const FUJI_WAVAX: &str = "0xd00ae08403B9bbb9124bB305C09058E32C39A48c";
/// Circle USDC on Avalanche Fuji
pub const FUJI_USDC: &str = "0x5425890298aed601595a70AB815c96711a31Bc65";

impl TrackedAssets {
    pub fn new(volatile_address: Address, stable_address: Address) -> Self {
        Self {
            volatile: TokenInfo {
                symbol: "WAVAX".to_string(),
                address: volatile_address,
                decimals: 18,
                market_id: "avalanche-2".to_string(),
            },
            stable: TokenInfo {
                symbol: "USDC".to_string(),
                address: stable_address,
                decimals: 6,
                market_id: "usd-coin".to_string(),
            },
        }
    }

    pub fn get(&self, asset: AssetId) -> &TokenInfo {
        match asset {
            AssetId::Volatile => &self.volatile,
            AssetId::Stable => &self.stable,
        }
    }
}

impl Default for TrackedAssets {
    fn default() -> Self {
        // Both constants are well-formed checksummed addresses
        let volatile = FUJI_WAVAX.parse().unwrap_or_default();
        let stable = FUJI_USDC.parse().unwrap_or_default();
        Self::new(volatile, stable)
    }
}

/// Convert a raw on-chain amount to its decimal-adjusted value
///
/// Returns `None` when the amount does not fit a `Decimal` mantissa.
pub fn from_raw_amount(raw_amount: u128, decimals: u32) -> Option<Decimal> {
    let raw = i128::try_from(raw_amount).ok()?;
    Decimal::try_from_i128_with_scale(raw, decimals).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_amount() {
        // 1 WAVAX = 10^18 wei
        assert_eq!(
            from_raw_amount(1_000_000_000_000_000_000, 18),
            Some(Decimal::from(1))
        );
        // 2.5 USDC
        assert_eq!(
            from_raw_amount(2_500_000, 6),
            Some(Decimal::from_str_exact("2.5").unwrap())
        );
        assert_eq!(from_raw_amount(u128::MAX, 18), None);
    }

    #[test]
    fn test_default_assets() {
        let assets = TrackedAssets::default();
        assert_eq!(assets.get(AssetId::Volatile).decimals, 18);
        assert_eq!(assets.get(AssetId::Stable).symbol, "USDC");
        assert_eq!(assets.volatile.address, FUJI_WAVAX.parse::<Address>().unwrap());
        assert_ne!(assets.stable.address, Address::zero());
    }
}
