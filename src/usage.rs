//! Durable daily usage gating
//!
//! A single record `{timestamp, count}` remembers when the current usage
//! window opened and how many replies completed inside it.

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

pub const USAGE_FILE: &str = "daily_usage.json";

/// Stored usage window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Start of the window in epoch milliseconds
    pub timestamp: i64,
    pub count: u32,
}

impl UsageRecord {
    fn started_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

pub trait UsageStore: Send + Sync {
    fn load(&mut self) -> Result<Option<UsageRecord>>;
    fn save(&mut self, record: &UsageRecord) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

pub struct FileUsageStore {
    path: PathBuf,
}

impl FileUsageStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store inside the given data directory
    pub fn in_dir(dir: PathBuf) -> Self {
        Self::new(dir.join(USAGE_FILE))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl UsageStore for FileUsageStore {
    fn load(&mut self) -> Result<Option<UsageRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        debug!("Loading usage record from {}", self.path.display());
        let json = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&mut self, record: &UsageRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Saving usage record to {}", self.path.display());
        std::fs::write(&self.path, serde_json::to_string(record)?)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            debug!("Removing usage record {}", self.path.display());
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MockUsageStore {
    pub record: Option<UsageRecord>,
    pub saves: usize,
}

#[cfg(test)]
impl MockUsageStore {
    pub fn with_record(record: UsageRecord) -> Self {
        Self {
            record: Some(record),
            saves: 0,
        }
    }
}

#[cfg(test)]
impl UsageStore for MockUsageStore {
    fn load(&mut self) -> Result<Option<UsageRecord>> {
        Ok(self.record)
    }

    fn save(&mut self, record: &UsageRecord) -> Result<()> {
        self.record = Some(*record);
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.record = None;
        Ok(())
    }
}

/// Length of one usage window
pub fn usage_window() -> Duration {
    Duration::hours(24)
}

/// In-memory view of the usage record plus its backing store
pub struct DailyUsage {
    store: Box<dyn UsageStore>,
    record: Option<UsageRecord>,
    /// Completed replies allowed per window; 0 disables the limit
    limit: u32,
}

impl DailyUsage {
    /// Read the stored record once, dropping it when its window has passed.
    /// Storage failures are logged and treated as "no usage yet".
    pub fn load(mut store: Box<dyn UsageStore>, limit: u32, now: DateTime<Utc>) -> Self {
        let record = match store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to read usage record: {}", e);
                None
            }
        };

        let record = match record {
            Some(record) if now - record.started_at() >= usage_window() => {
                debug!("Usage window from {} expired, clearing", record.timestamp);
                if let Err(e) = store.clear() {
                    warn!("Failed to clear expired usage record: {}", e);
                }
                None
            }
            other => other,
        };

        Self {
            store,
            record,
            limit,
        }
    }

    pub fn record(&self) -> Option<UsageRecord> {
        self.record
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// When the limit is exhausted, the moment the window reopens
    pub fn exhausted_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.limit == 0 {
            return None;
        }
        let record = self.record?;
        let reopens = record.started_at() + usage_window();
        (now < reopens && record.count >= self.limit).then_some(reopens)
    }

    /// Count one completed reply.
    ///
    /// Inside a live window the count grows and the window start is kept;
    /// otherwise a new window starts at `now`.
    pub fn record_completion(&mut self, now: DateTime<Utc>) {
        let record = match self.record {
            Some(record) if now - record.started_at() < usage_window() => UsageRecord {
                timestamp: record.timestamp,
                count: record.count.saturating_add(1),
            },
            _ => UsageRecord {
                timestamp: now.timestamp_millis(),
                count: 1,
            },
        };

        debug!("Recording usage: {} in window {}", record.count, record.timestamp);
        self.record = Some(record);
        if let Err(e) = self.store.save(&record) {
            warn!("Failed to persist usage record: {}", e);
        }
    }
}
