//! Market snapshot provider
//!
//! Fetches price and 24h change per tracked asset, derives a volatility
//! score, and caches the result for a fixed TTL. This stage never fails:
//! a fetch error falls back to the last cached snapshot, then to a fixed
//! conservative default.

pub mod cache;
pub mod coingecko;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::amount::TrackedAssets;
use crate::error::MarketFetchError;
use crate::telemetry::ActivityLog;
use crate::types::{AssetId, MarketSnapshot, MarketSnapshots};

pub use cache::{CachedSnapshot, MemorySnapshotCache, SnapshotCache};
pub use coingecko::CoinGeckoClient;

/// Volatility cap: 100% expressed in basis points
pub const MAX_VOLATILITY_BPS: u32 = 10_000;
/// Volatility assumed when no market data has ever been seen
pub const FALLBACK_VOLATILITY_BPS: u32 = 200;
/// Longest snapshot lifetime; larger TTLs are clamped to this
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Raw quote from a market data source
#[derive(Debug, Clone, PartialEq)]
pub struct PriceChange {
    pub usd_price: Decimal,
    pub pct_24h_change: f64,
}

/// External market data collaborator
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn price_and_change(&self, market_id: &str) -> Result<PriceChange, MarketFetchError>;

    fn name(&self) -> &str;
}

/// `floor(min(|pct| * 100, 10000))`; NaN reads as a flat day
pub fn volatility_bps_from_change(pct_24h_change: f64) -> u32 {
    if pct_24h_change.is_nan() {
        return 0;
    }
    (pct_24h_change.abs() * 100.0).min(MAX_VOLATILITY_BPS as f64) as u32
}

/// Hardcoded snapshot used when an asset has never been fetched successfully
pub fn fallback_snapshot(asset: AssetId) -> MarketSnapshot {
    let price = match asset {
        AssetId::Volatile => Decimal::new(3550, 2),
        AssetId::Stable => Decimal::ONE,
    };
    MarketSnapshot {
        asset,
        price,
        volatility_bps: FALLBACK_VOLATILITY_BPS,
        observed_at: Utc::now(),
    }
}

pub struct MarketSnapshotProvider {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<dyn SnapshotCache>,
    assets: TrackedAssets,
    ttl: Duration,
    request_timeout: Duration,
    activity: ActivityLog,
}

impl MarketSnapshotProvider {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: Arc<dyn SnapshotCache>,
        assets: TrackedAssets,
        ttl: Duration,
        activity: ActivityLog,
    ) -> Self {
        Self {
            source,
            cache,
            assets,
            ttl: ttl.min(MAX_CACHE_TTL),
            request_timeout: Duration::from_secs(10),
            activity,
        }
    }

    /// Bound on a single source call
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Snapshot for one asset; cached within the TTL, never an error
    pub async fn get_snapshot(&self, asset: AssetId) -> MarketSnapshot {
        let now = Instant::now();
        let cached = self.cache.get(asset).await;

        if let Some(hit) = cached.as_ref().filter(|c| c.is_fresh(now)) {
            debug!("Market cache hit for {}", asset);
            return hit.snapshot.clone();
        }

        let market_id = self.assets.get(asset).market_id.clone();
        let fetched = match tokio::time::timeout(
            self.request_timeout,
            self.source.price_and_change(&market_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MarketFetchError::Timeout(self.request_timeout.as_secs())),
        };

        match fetched {
            Ok(quote) => {
                let snapshot = MarketSnapshot {
                    asset,
                    price: quote.usd_price,
                    volatility_bps: volatility_bps_from_change(quote.pct_24h_change),
                    observed_at: Utc::now(),
                };
                self.cache.put(asset, snapshot.clone(), self.expiry()).await;
                snapshot
            }
            Err(e) => {
                self.activity
                    .error(
                        format!("Failed to fetch market data for {}", market_id),
                        Some(serde_json::json!({
                            "source": self.source.name(),
                            "error": e.to_string(),
                        })),
                    )
                    .await;

                match cached {
                    Some(stale) => {
                        warn!("Using stale market data for {}", market_id);
                        stale.snapshot
                    }
                    None => {
                        warn!("Using fallback market data for {}", market_id);
                        fallback_snapshot(asset)
                    }
                }
            }
        }
    }

    /// Expires immediately if the clock cannot represent `now + ttl`
    fn expiry(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.ttl).unwrap_or(now)
    }

    /// Both tracked assets, fetched concurrently with isolated failures
    pub async fn get_all_snapshots(&self) -> MarketSnapshots {
        let (volatile, stable) = tokio::join!(
            self.get_snapshot(AssetId::Volatile),
            self.get_snapshot(AssetId::Stable)
        );
        MarketSnapshots {
            volatile,
            stable,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityType;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted source: per-market-id queue of results
    struct ScriptedSource {
        responses: Mutex<HashMap<String, Vec<Result<PriceChange, MarketFetchError>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn push(&self, id: &str, result: Result<PriceChange, MarketFetchError>) {
            self.responses
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_default()
                .push(result);
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn price_and_change(&self, market_id: &str) -> Result<PriceChange, MarketFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(market_id) {
                Some(queue) if !queue.is_empty() => queue.remove(0),
                _ => Err(MarketFetchError::Api("unreachable".to_string())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn quote(price: i64, pct: f64) -> Result<PriceChange, MarketFetchError> {
        Ok(PriceChange {
            usd_price: Decimal::from(price),
            pct_24h_change: pct,
        })
    }

    fn provider(
        source: Arc<ScriptedSource>,
        ttl: Duration,
    ) -> (MarketSnapshotProvider, ActivityLog) {
        let activity = ActivityLog::in_memory();
        let provider = MarketSnapshotProvider::new(
            source,
            Arc::new(MemorySnapshotCache::new()),
            TrackedAssets::default(),
            ttl,
            activity.clone(),
        );
        (provider, activity)
    }

    #[test]
    fn test_volatility_bps() {
        assert_eq!(volatility_bps_from_change(15.0), 1500);
        assert_eq!(volatility_bps_from_change(-4.25), 425);
        assert_eq!(volatility_bps_from_change(250.0), 10_000);
        assert_eq!(volatility_bps_from_change(f64::NAN), 0);
        assert_eq!(volatility_bps_from_change(f64::INFINITY), 10_000);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_source() {
        let source = Arc::new(ScriptedSource::new());
        source.push("avalanche-2", quote(35, 3.0));
        let (provider, _) = provider(Arc::clone(&source), Duration::from_secs(60));

        let first = provider.get_snapshot(AssetId::Volatile).await;
        let second = provider.get_snapshot(AssetId::Volatile).await;

        assert_eq!(first, second);
        assert_eq!(first.volatility_bps, 300);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let source = Arc::new(ScriptedSource::new());
        source.push("avalanche-2", quote(35, 3.0));
        source.push("avalanche-2", quote(36, 1.0));
        let (provider, _) = provider(Arc::clone(&source), Duration::ZERO);

        provider.get_snapshot(AssetId::Volatile).await;
        let second = provider.get_snapshot(AssetId::Volatile).await;

        assert_eq!(second.price, Decimal::from(36));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_returns_stale_cache() {
        let source = Arc::new(ScriptedSource::new());
        source.push("avalanche-2", quote(40, 2.0));
        let (provider, activity) = provider(Arc::clone(&source), Duration::ZERO);

        let first = provider.get_snapshot(AssetId::Volatile).await;
        let second = provider.get_snapshot(AssetId::Volatile).await;

        assert_eq!(second, first);
        let recent = activity.read_recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].entry_type, ActivityType::Error);
        assert!(recent[0].message.contains("avalanche-2"));
    }

    #[tokio::test]
    async fn test_failure_without_cache_uses_fallbacks() {
        let source = Arc::new(ScriptedSource::new());
        let (provider, activity) = provider(source, Duration::from_secs(60));

        let all = provider.get_all_snapshots().await;

        assert_eq!(all.volatile.price, Decimal::new(3550, 2));
        assert_eq!(all.stable.price, Decimal::ONE);
        assert_eq!(all.volatile.volatility_bps, FALLBACK_VOLATILITY_BPS);
        assert_eq!(all.stable.volatility_bps, FALLBACK_VOLATILITY_BPS);
        assert_eq!(activity.read_recent(10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_huge_ttl_is_clamped() {
        let source = Arc::new(ScriptedSource::new());
        source.push("avalanche-2", quote(35, 3.0));
        let (provider, activity) = provider(Arc::clone(&source), Duration::MAX);

        let first = provider.get_snapshot(AssetId::Volatile).await;
        let second = provider.get_snapshot(AssetId::Volatile).await;

        assert_eq!(first, second);
        assert_eq!(first.price, Decimal::from(35));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(activity.read_recent(10).await.is_empty());
    }

    /// Never answers within any reasonable timeout
    struct StalledSource;

    #[async_trait]
    impl MarketDataSource for StalledSource {
        async fn price_and_change(&self, _id: &str) -> Result<PriceChange, MarketFetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(MarketFetchError::Api("too late".to_string()))
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_slow_source_times_out_to_fallback() {
        let activity = ActivityLog::in_memory();
        let provider = MarketSnapshotProvider::new(
            Arc::new(StalledSource),
            Arc::new(MemorySnapshotCache::new()),
            TrackedAssets::default(),
            Duration::from_secs(60),
            activity.clone(),
        )
        .with_request_timeout(Duration::from_millis(50));

        let snapshot = provider.get_snapshot(AssetId::Volatile).await;

        assert_eq!(snapshot.price, Decimal::new(3550, 2));
        assert_eq!(snapshot.volatility_bps, FALLBACK_VOLATILITY_BPS);
        let recent = activity.read_recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].entry_type, ActivityType::Error);
        let details = recent[0].details.as_ref().unwrap();
        assert!(details["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_assets_fail_independently() {
        let source = Arc::new(ScriptedSource::new());
        source.push("usd-coin", quote(1, 0.1));
        let (provider, _) = provider(source, Duration::from_secs(60));

        let all = provider.get_all_snapshots().await;
        assert_eq!(all.stable.volatility_bps, 10);
        assert_eq!(all.volatile, MarketSnapshot {
            observed_at: all.volatile.observed_at,
            ..fallback_snapshot(AssetId::Volatile)
        });
    }
}
