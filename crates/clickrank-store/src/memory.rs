//! In-memory score store
//!
//! Ties on count are broken by user id ascending.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use clickrank_core::{ClickrankResult, RankingEntry, UserId};

use crate::ScoreStore;

/// Persisted state for one user
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScoreRecord {
    pub alias: Option<String>,
    pub count: Option<u64>,
    pub last_click: Option<u64>,
}

impl ScoreRecord {
    fn entry(&self, user: &UserId) -> RankingEntry {
        RankingEntry {
            user_id: user.clone(),
            display_alias: self.alias.clone(),
            count: self.count.unwrap_or(0),
            last_click_timestamp: self.last_click,
        }
    }
}

/// Score store backed by a process-local map
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    records: RwLock<HashMap<UserId, ScoreRecord>>,
    stamp_clicks: bool,
}

impl MemoryScoreStore {
    /// Store that stamps the last-click time on every write
    pub fn new() -> Self {
        MemoryScoreStore {
            records: RwLock::new(HashMap::new()),
            stamp_clicks: true,
        }
    }

    /// Store that never stamps last-click times, keeping entries reproducible
    pub fn unstamped() -> Self {
        MemoryScoreStore::default()
    }

    /// Insert or replace a whole record
    pub fn seed(&self, user: impl Into<UserId>, record: ScoreRecord) {
        self.records.write().insert(user.into(), record);
    }

    /// Set the alias shown in rankings, creating an empty record if needed
    pub fn set_alias(&self, user: impl Into<UserId>, alias: impl Into<String>) {
        self.records
            .write()
            .entry(user.into())
            .or_default()
            .alias = Some(alias.into());
    }

    /// Get a copy of a user's record
    pub fn record(&self, user: &UserId) -> Option<ScoreRecord> {
        self.records.read().get(user).cloned()
    }

    /// Number of users with a record
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn ranked(&self, limit: usize) -> Vec<RankingEntry> {
        let records = self.records.read();
        let mut entries: Vec<RankingEntry> = records
            .iter()
            .filter(|(_, record)| record.count.is_some())
            .map(|(user, record)| record.entry(user))
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user_id.cmp(&b.user_id)));
        entries.truncate(limit);
        entries
    }
}

fn now_millis() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

impl ScoreStore for MemoryScoreStore {
    async fn read_count(&self, user: &UserId) -> ClickrankResult<u64> {
        Ok(self
            .records
            .read()
            .get(user)
            .and_then(|r| r.count)
            .unwrap_or(0))
    }

    async fn write_count(&self, user: &UserId, count: u64) -> ClickrankResult<()> {
        let stamp = if self.stamp_clicks { now_millis() } else { None };
        let mut records = self.records.write();
        let record = records.entry(user.clone()).or_default();
        if let Some(stored) = record.count.filter(|&stored| stored > count) {
            tracing::trace!(user = %user, count, stored, "stale score write ignored");
            return Ok(());
        }
        record.count = Some(count);
        if stamp.is_some() {
            record.last_click = stamp;
        }
        tracing::trace!(user = %user, count, "score written");
        Ok(())
    }

    async fn top(&self, limit: usize) -> ClickrankResult<Vec<RankingEntry>> {
        Ok(self.ranked(limit))
    }

    async fn total(&self) -> ClickrankResult<u64> {
        Ok(self
            .records
            .read()
            .values()
            .filter_map(|r| r.count)
            .sum())
    }
}
