//! Snapshot cache owned by the market snapshot provider

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::{AssetId, MarketSnapshot};

/// A cached snapshot together with its expiry
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub snapshot: MarketSnapshot,
    pub expires_at: Instant,
}

impl CachedSnapshot {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Keyed snapshot storage with explicit expiry
///
/// `get` returns expired entries too; the provider still needs them as a
/// stale fallback when the market source is down.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, key: AssetId) -> Option<CachedSnapshot>;

    async fn put(&self, key: AssetId, value: MarketSnapshot, expires_at: Instant);
}

#[derive(Default)]
pub struct MemorySnapshotCache {
    entries: RwLock<HashMap<AssetId, CachedSnapshot>>,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn get(&self, key: AssetId) -> Option<CachedSnapshot> {
        self.entries.read().await.get(&key).cloned()
    }

    async fn put(&self, key: AssetId, value: MarketSnapshot, expires_at: Instant) {
        self.entries.write().await.insert(
            key,
            CachedSnapshot {
                snapshot: value,
                expires_at,
            },
        );
    }
}
