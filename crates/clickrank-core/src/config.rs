//! Runtime configuration
//!
//! Nothing here is read from the environment; the gateway builds these
//! from its command line and hands them to the runtime.

use std::fmt;
use std::str::FromStr;

use crate::ClickrankError;

/// Default number of users in the broadcast ranking
pub const DEFAULT_RANKING_LIMIT: usize = 10;

/// Default depth of each session's outbound event queue
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// How a freshly queried ranking is compared with the last broadcast one
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RankingComparison {
    /// Every field of every entry, in order
    #[default]
    Full,
    /// Only the ordered user ids
    Standing,
}

impl FromStr for RankingComparison {
    type Err = ClickrankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(RankingComparison::Full),
            "standing" => Ok(RankingComparison::Standing),
            other => Err(ClickrankError::InvalidMessage(format!(
                "unknown ranking comparison '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RankingComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingComparison::Full => f.write_str("full"),
            RankingComparison::Standing => f.write_str("standing"),
        }
    }
}

/// Where the process-wide click counter starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CounterSeed {
    /// Start at zero on every restart
    #[default]
    Zero,
    /// Start at the sum of all persisted per-user counts
    StoreTotal,
}

impl FromStr for CounterSeed {
    type Err = ClickrankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(CounterSeed::Zero),
            "store-total" => Ok(CounterSeed::StoreTotal),
            other => Err(ClickrankError::InvalidMessage(format!(
                "unknown counter seed '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CounterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterSeed::Zero => f.write_str("zero"),
            CounterSeed::StoreTotal => f.write_str("store-total"),
        }
    }
}

/// Ranking broadcaster configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankingConfig {
    /// Maximum entries in a snapshot (top-N)
    pub limit: usize,
    /// Change-detection policy
    pub comparison: RankingComparison,
}

impl Default for RankingConfig {
    fn default() -> Self {
        RankingConfig {
            limit: DEFAULT_RANKING_LIMIT,
            comparison: RankingComparison::default(),
        }
    }
}

/// Counter coordinator configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub ranking: RankingConfig,
    pub counter_seed: CounterSeed,
    /// Undelivered events a session may hold before it is dropped as too slow
    pub outbound_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            ranking: RankingConfig::default(),
            counter_seed: CounterSeed::default(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}
