//! Counter coordinator
//!
//! Applies authenticated clicks to the shared counter, broadcasts each new
//! value, persists it for the clicking user and triggers the ranking
//! refresh. Persistence is fire-and-forget: a failed write is logged and
//! neither the increment nor the broadcast is rolled back, so the in-memory
//! counter can run ahead of the stored value until the next good write.

use std::sync::Arc;

use clickrank_core::{
    ClickrankResult, CoordinatorConfig, CounterSeed, RankingSnapshot, ServerEvent, UserId,
};
use clickrank_store::ScoreStore;

use crate::{ClickCounter, Fanout, RankingBroadcaster, Session};

/// Owner of the click counter and the ranking broadcaster
pub struct Coordinator<S> {
    store: Arc<S>,
    fanout: Arc<Fanout>,
    counter: ClickCounter,
    ranking: RankingBroadcaster<S>,
}

impl<S: ScoreStore> Coordinator<S> {
    /// Build a coordinator with an explicit starting counter value
    pub fn new(store: Arc<S>, fanout: Arc<Fanout>, config: CoordinatorConfig, initial: u64) -> Self {
        let ranking = RankingBroadcaster::new(Arc::clone(&store), Arc::clone(&fanout), config.ranking);
        Coordinator {
            store,
            fanout,
            counter: ClickCounter::new(initial),
            ranking,
        }
    }

    /// Build a coordinator, seeding the counter according to `config.counter_seed`.
    ///
    /// Fails only when the seed policy needs the store and the store fails.
    pub async fn start(
        store: Arc<S>,
        fanout: Arc<Fanout>,
        config: CoordinatorConfig,
    ) -> ClickrankResult<Self> {
        let initial = match config.counter_seed {
            CounterSeed::Zero => 0,
            CounterSeed::StoreTotal => store.total().await?,
        };
        tracing::info!(
            seed = %config.counter_seed,
            initial,
            ranking_limit = config.ranking.limit,
            comparison = %config.ranking.comparison,
            "counter coordinator started"
        );
        Ok(Self::new(store, fanout, config, initial))
    }

    /// Current top-N for any caller. A failed query yields an empty ranking.
    pub async fn request_ranking(&self) -> RankingSnapshot {
        match self.ranking.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "ranking request failed, answering empty");
                RankingSnapshot::empty()
            }
        }
    }

    /// Persisted count for the session's user; 0 when unauthenticated
    /// (without touching the store) or when the read fails.
    pub async fn request_own_count(&self, session: &Session) -> u64 {
        let Some(user) = session.identity() else {
            return 0;
        };
        match self.store.read_count(&user).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(connection = %session.id(), user = %user, error = %e, "count read failed");
                0
            }
        }
    }

    /// Apply a click. Unauthenticated sessions are ignored and `None` is
    /// returned; otherwise the new counter value.
    pub async fn record_click(&self, session: &Session) -> Option<u64> {
        let Some(user) = session.identity() else {
            tracing::debug!(connection = %session.id(), "click ignored: unauthenticated");
            return None;
        };

        let fanout = &self.fanout;
        let value = self
            .counter
            .increment_with(|v| {
                fanout.broadcast(&ServerEvent::CounterUpdated(v));
            });
        tracing::debug!(connection = %session.id(), user = %user, count = value, "click accepted");

        self.persist(&user, value).await;
        self.ranking.refresh().await;
        Some(value)
    }

    async fn persist(&self, user: &UserId, value: u64) {
        if let Err(e) = self.store.write_count(user, value).await {
            tracing::warn!(user = %user, count = value, error = %e, "count write failed, in-memory counter ahead of store");
        }
    }

    /// Current counter value
    pub fn counter(&self) -> u64 {
        self.counter.get()
    }

    pub fn ranking(&self) -> &RankingBroadcaster<S> {
        &self.ranking
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
