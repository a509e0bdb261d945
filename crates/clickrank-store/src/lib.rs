//! Clickrank Store - Durable per-user click counts
//!
//! This crate provides:
//! - The `ScoreStore` contract the runtime is written against
//! - An in-memory store for development and tests

pub mod memory;

pub use memory::*;

use std::future::Future;

use clickrank_core::{ClickrankResult, RankingEntry, UserId};

/// Durable key-value store of click counts keyed by user.
///
/// Every call is a suspension point for the caller. Implementations report
/// failures as `ClickrankError::Store`; callers decide how to degrade.
pub trait ScoreStore: Send + Sync + 'static {
    /// Persisted count for a user. Unknown users read as 0.
    fn read_count(&self, user: &UserId) -> impl Future<Output = ClickrankResult<u64>> + Send;

    /// Upsert a user's count, leaving other fields of the record untouched.
    ///
    /// A stored count never decreases. Writes from concurrent clicks may
    /// arrive out of order; one carrying a lower count than the stored one
    /// succeeds and has no effect.
    fn write_count(
        &self,
        user: &UserId,
        count: u64,
    ) -> impl Future<Output = ClickrankResult<()>> + Send;

    /// At most `limit` entries, count descending. Tie-break is store defined.
    fn top(&self, limit: usize) -> impl Future<Output = ClickrankResult<Vec<RankingEntry>>> + Send;

    /// Sum of all persisted counts
    fn total(&self) -> impl Future<Output = ClickrankResult<u64>> + Send;
}
