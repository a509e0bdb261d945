//! Ranking value types
//!
//! A ranking snapshot is an ordered, immutable top-N sequence. Order encodes
//! rank, so every comparison here is order sensitive.

use serde::{Deserialize, Serialize};

use crate::{RankingComparison, UserId};

/// One ranked user as reported by the score store
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_alias: Option<String>,
    pub count: u64,
    /// Milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_click_timestamp: Option<u64>,
}

impl RankingEntry {
    pub fn new(user_id: impl Into<UserId>, count: u64) -> Self {
        RankingEntry {
            user_id: user_id.into(),
            display_alias: None,
            count,
            last_click_timestamp: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.display_alias = Some(alias.into());
        self
    }

    pub fn with_last_click(mut self, timestamp_ms: u64) -> Self {
        self.last_click_timestamp = Some(timestamp_ms);
        self
    }
}

/// Ordered top-N sequence, count descending
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankingSnapshot {
    entries: Vec<RankingEntry>,
}

impl RankingSnapshot {
    /// The empty ranking
    pub fn empty() -> Self {
        RankingSnapshot::default()
    }

    /// Build a snapshot from entries already ordered by the store.
    /// No secondary sort is applied.
    pub fn from_entries(entries: Vec<RankingEntry>) -> Self {
        RankingSnapshot { entries }
    }

    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank of a user (0 = first place)
    pub fn position_of(&self, user: &UserId) -> Option<usize> {
        self.entries.iter().position(|e| &e.user_id == user)
    }

    /// Ordered user ids, the "standing" of the ranking
    pub fn standing(&self) -> impl Iterator<Item = &UserId> + '_ {
        self.entries.iter().map(|e| &e.user_id)
    }

    /// Same users in the same order, ignoring counts and metadata
    pub fn same_standing(&self, other: &RankingSnapshot) -> bool {
        self.entries.len() == other.entries.len() && self.standing().eq(other.standing())
    }

    /// Whether `other` counts as unchanged under the given comparison
    pub fn matches(&self, other: &RankingSnapshot, comparison: RankingComparison) -> bool {
        match comparison {
            RankingComparison::Full => self == other,
            RankingComparison::Standing => self.same_standing(other),
        }
    }
}

impl From<Vec<RankingEntry>> for RankingSnapshot {
    fn from(entries: Vec<RankingEntry>) -> Self {
        RankingSnapshot::from_entries(entries)
    }
}
