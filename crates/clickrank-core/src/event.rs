//! Wire events
//!
//! Clients send named, payload-free requests; the server answers or pushes
//! named events carrying a single `data` payload. Names are part of the
//! wire contract and must not change.

use serde::{Deserialize, Serialize};

use crate::{ClickrankError, ClickrankResult, RankingSnapshot};

/// Event sent by a connected client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Ask for the current top-N; never requires authentication
    RequestRanking,
    /// Ask for the caller's persisted count; 0 when unauthenticated
    RequestOwnCount,
    /// Increment the shared counter; ignored when unauthenticated
    Click,
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(self) -> &'static str {
        match self {
            ClientEvent::RequestRanking => "request-ranking",
            ClientEvent::RequestOwnCount => "request-own-count",
            ClientEvent::Click => "click",
        }
    }

    /// Whether the event only has an effect for authenticated sessions
    pub fn requires_identity(self) -> bool {
        !matches!(self, ClientEvent::RequestRanking)
    }

    /// Parse a text frame
    pub fn decode(text: &str) -> ClickrankResult<Self> {
        serde_json::from_str(text).map_err(|e| ClickrankError::InvalidMessage(e.to_string()))
    }
}

/// Event sent by the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Reply to `request-ranking`
    RankingSnapshot(RankingSnapshot),
    /// Reply to `request-own-count`
    OwnCount(u64),
    /// Broadcast after every accepted click
    CounterUpdated(u64),
    /// Broadcast when the top-N changed
    RankingUpdated(RankingSnapshot),
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RankingSnapshot(_) => "ranking-snapshot",
            ServerEvent::OwnCount(_) => "own-count",
            ServerEvent::CounterUpdated(_) => "counter-updated",
            ServerEvent::RankingUpdated(_) => "ranking-updated",
        }
    }

    /// Whether the event is pushed to every session rather than a single requester
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            ServerEvent::CounterUpdated(_) | ServerEvent::RankingUpdated(_)
        )
    }

    /// Serialize to a text frame
    pub fn encode(&self) -> ClickrankResult<String> {
        serde_json::to_string(self).map_err(|e| ClickrankError::InvalidMessage(e.to_string()))
    }
}
