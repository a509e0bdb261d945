//! Gateway configuration
//!
//! Every option can come from the command line or the environment.

use std::net::{IpAddr, SocketAddr};

use clap::builder::TypedValueParser;
use clap::Parser;
use thiserror::Error;

use clickrank_core::{
    CoordinatorConfig, CounterSeed, RankingComparison, RankingConfig, DEFAULT_OUTBOUND_CAPACITY,
    DEFAULT_RANKING_LIMIT,
};

use crate::LogFormat;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Identity key must be 64 hex characters")]
    InvalidIdentityKey,
}

/// Command-line arguments for the gateway binary
#[derive(Clone, Debug, Parser)]
#[command(name = "clickrank-gateway", version, about = "Real-time click counter and leaderboard server")]
pub struct GatewayArgs {
    /// Address to listen on
    #[arg(long, env = "CLICKRANK_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "CLICKRANK_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Allowed browser origin(s); `*` allows any
    #[arg(
        long = "allowed-origin",
        env = "CLICKRANK_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:4200"
    )]
    pub allowed_origins: Vec<String>,

    /// Number of users in the ranking
    #[arg(
        long,
        env = "CLICKRANK_RANKING_LIMIT",
        default_value_t = DEFAULT_RANKING_LIMIT,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    pub ranking_limit: usize,

    /// Ranking change detection: `full` or `standing`
    #[arg(long, env = "CLICKRANK_RANKING_COMPARISON", default_value_t = RankingComparison::Full)]
    pub ranking_comparison: RankingComparison,

    /// Counter start value: `zero` or `store-total`
    #[arg(long, env = "CLICKRANK_COUNTER_SEED", default_value_t = CounterSeed::Zero)]
    pub counter_seed: CounterSeed,

    /// Undelivered events a connection may queue before it is dropped
    #[arg(
        long,
        env = "CLICKRANK_OUTBOUND_CAPACITY",
        default_value_t = DEFAULT_OUTBOUND_CAPACITY,
        value_parser = clap::value_parser!(u32).range(1..).map(|v| v as usize)
    )]
    pub outbound_capacity: usize,

    /// Hex Ed25519 secret for the local identity provider; generated when absent
    #[arg(long, env = "CLICKRANK_IDENTITY_KEY", hide_env_values = true)]
    pub identity_key: Option<String>,

    /// Log output format
    #[arg(long, env = "CLICKRANK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl GatewayArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            ranking: RankingConfig {
                limit: self.ranking_limit,
                comparison: self.ranking_comparison,
            },
            counter_seed: self.counter_seed,
            outbound_capacity: self.outbound_capacity,
        }
    }

    /// Decoded identity key, if one was supplied
    pub fn identity_key(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        let Some(key) = &self.identity_key else {
            return Ok(None);
        };
        let bytes = hex::decode(key.trim()).map_err(|_| ConfigError::InvalidIdentityKey)?;
        bytes
            .try_into()
            .map(Some)
            .map_err(|_| ConfigError::InvalidIdentityKey)
    }
}
