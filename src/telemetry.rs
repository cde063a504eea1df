//! Activity telemetry - bounded, newest-first append log
//!
//! Sinks are pluggable: [`MemoryTelemetry`] for tests and short-lived runs,
//! [`FileTelemetry`] for a durable JSON file. Both serialize writers through a
//! single async mutex. Persistence is best-effort; a failed write is logged
//! and never reaches the pipeline.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::types::{ActivityLogEntry, ActivityType};

/// Ring size of the activity log
pub const MAX_ACTIVITY_ENTRIES: usize = 100;

/// Append-only store of activity entries
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Append one entry; must never fail from the caller's point of view
    async fn append(&self, entry: ActivityLogEntry);

    /// Up to `limit` entries, newest first
    async fn read_recent(&self, limit: usize) -> Vec<ActivityLogEntry>;
}

/// In-memory ring buffer
pub struct MemoryTelemetry {
    entries: Mutex<VecDeque<ActivityLogEntry>>,
    capacity: usize,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_ACTIVITY_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }
}

impl Default for MemoryTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySink for MemoryTelemetry {
    async fn append(&self, entry: ActivityLogEntry) {
        let mut entries = self.entries.lock().await;
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    async fn read_recent(&self, limit: usize) -> Vec<ActivityLogEntry> {
        let entries = self.entries.lock().await;
        entries.iter().take(limit).cloned().collect()
    }
}

/// JSON file holding the newest-first activity array
pub struct FileTelemetry {
    path: PathBuf,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl FileTelemetry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, MAX_ACTIVITY_ENTRIES)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            write_lock: Mutex::new(()),
        }
    }

    /// Missing or unreadable files read as an empty log
    async fn load(&self) -> Vec<ActivityLogEntry> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Activity file {} is corrupt, starting fresh: {}", self.path.display(), e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    async fn persist(&self, entries: &[ActivityLogEntry]) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json).await?;
        debug!("Wrote {} activity entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for FileTelemetry {
    async fn append(&self, entry: ActivityLogEntry) {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await;
        entries.insert(0, entry);
        entries.truncate(self.capacity);

        if let Err(e) = self.persist(&entries).await {
            error!("Failed to persist activity log: {}", e);
        }
    }

    async fn read_recent(&self, limit: usize) -> Vec<ActivityLogEntry> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await;
        entries.truncate(limit);
        entries
    }
}

/// Handle used by every stage to record activity
///
/// Each entry is mirrored to `tracing` before it is appended.
#[derive(Clone)]
pub struct ActivityLog {
    sink: Arc<dyn TelemetrySink>,
}

impl ActivityLog {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTelemetry::new()))
    }

    pub async fn log(
        &self,
        entry_type: ActivityType,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> ActivityLogEntry {
        let entry = ActivityLogEntry::new(entry_type, message, details);
        let details = entry
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();

        let (kind, message) = (entry.entry_type, &entry.message);
        match kind {
            ActivityType::Error => error!("[GUARDIAN] [{}] {} {}", kind, message, details),
            ActivityType::Warning => warn!("[GUARDIAN] [{}] {} {}", kind, message, details),
            _ => info!("[GUARDIAN] [{}] {} {}", kind, message, details),
        }

        self.sink.append(entry.clone()).await;
        entry
    }

    pub async fn info(&self, message: impl Into<String>, details: Option<serde_json::Value>) {
        self.log(ActivityType::Info, message, details).await;
    }

    pub async fn error(&self, message: impl Into<String>, details: Option<serde_json::Value>) {
        self.log(ActivityType::Error, message, details).await;
    }

    pub async fn read_recent(&self, limit: usize) -> Vec<ActivityLogEntry> {
        self.sink.read_recent(limit).await
    }
}
