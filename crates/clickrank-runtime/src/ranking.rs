//! Ranking broadcaster
//!
//! Holds the last broadcast top-N. After each accepted click the top-N is
//! re-queried; it is pushed to every session only when it differs from the
//! held snapshot under the configured comparison. Ties are whatever order
//! the store returns; no secondary sort is applied here.

use std::sync::Arc;

use parking_lot::Mutex;

use clickrank_core::{ClickrankResult, RankingConfig, RankingSnapshot, ServerEvent};
use clickrank_store::ScoreStore;

use crate::Fanout;

/// Change-detecting top-N broadcaster
pub struct RankingBroadcaster<S> {
    store: Arc<S>,
    fanout: Arc<Fanout>,
    config: RankingConfig,
    last: Mutex<RankingSnapshot>,
}

impl<S: ScoreStore> RankingBroadcaster<S> {
    pub fn new(store: Arc<S>, fanout: Arc<Fanout>, config: RankingConfig) -> Self {
        RankingBroadcaster {
            store,
            fanout,
            config,
            last: Mutex::new(RankingSnapshot::empty()),
        }
    }

    /// Query the current top-N
    pub async fn fetch(&self) -> ClickrankResult<RankingSnapshot> {
        let entries = self.store.top(self.config.limit).await?;
        Ok(RankingSnapshot::from_entries(entries))
    }

    /// Re-query and broadcast on change. Returns whether a broadcast went out.
    ///
    /// A failed query is logged and leaves the held snapshot untouched.
    pub async fn refresh(&self) -> bool {
        let current = match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "ranking query failed, skipping broadcast");
                return false;
            }
        };
        self.offer(current)
    }

    /// Compare-and-replace against the held snapshot.
    ///
    /// The compare, replace and broadcast happen under one lock so two
    /// concurrent refreshes cannot both broadcast the same change.
    pub fn offer(&self, current: RankingSnapshot) -> bool {
        let mut last = self.last.lock();
        if last.matches(&current, self.config.comparison) {
            tracing::trace!(entries = current.len(), "ranking unchanged");
            return false;
        }

        *last = current.clone();
        let delivered = self.fanout.broadcast(&ServerEvent::RankingUpdated(current));
        tracing::debug!(entries = last.len(), delivered, "ranking changed");
        true
    }

    /// The last snapshot that was broadcast (empty before the first one)
    pub fn last_broadcast(&self) -> RankingSnapshot {
        self.last.lock().clone()
    }

    pub fn config(&self) -> RankingConfig {
        self.config
    }
}
