//! Multi-client harness over the runtime

use std::sync::Arc;

use clickrank_core::{
    ClickrankResult, ClientEvent, ConnectionId, CoordinatorConfig, RankingSnapshot, ServerEvent,
};
use clickrank_identity::IdentityVerifier;
use clickrank_runtime::{Connection, Runtime, Session};
use clickrank_store::ScoreStore;

/// A connected client as seen by tests
pub struct TestClient {
    connection: Connection,
}

impl TestClient {
    pub fn id(&self) -> ConnectionId {
        self.connection.session.id()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.connection.session
    }

    /// Wait for identity resolution, if one was started
    pub async fn resolved(&mut self) {
        if let Some(handle) = self.connection.resolution.take() {
            handle.await.expect("identity resolution task panicked");
        }
    }

    /// Everything queued for this client so far
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.connection.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Values of every `counter-updated` event, in order
pub fn counter_values(events: &[ServerEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::CounterUpdated(v) => Some(*v),
            _ => None,
        })
        .collect()
}

/// Payloads of every `ranking-updated` event, in order
pub fn ranking_updates(events: &[ServerEvent]) -> Vec<RankingSnapshot> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::RankingUpdated(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

/// Runtime plus helpers for driving many clients
pub struct Harness<V, S> {
    runtime: Arc<Runtime<V, S>>,
}

impl<V: IdentityVerifier, S: ScoreStore> Harness<V, S> {
    pub async fn start(verifier: V, store: S, config: CoordinatorConfig) -> ClickrankResult<Self> {
        let runtime = Runtime::start(Arc::new(verifier), Arc::new(store), config).await?;
        Ok(Harness {
            runtime: Arc::new(runtime),
        })
    }

    /// Connect without waiting for identity resolution
    pub fn connect(&self, credential: Option<&str>) -> TestClient {
        TestClient {
            connection: self.runtime.connect(credential.map(String::from)),
        }
    }

    /// Connect and wait until the credential has been resolved
    pub async fn connect_resolved(&self, credential: &str) -> TestClient {
        let mut client = self.connect(Some(credential));
        client.resolved().await;
        client
    }

    pub async fn send(&self, client: &TestClient, event: ClientEvent) {
        self.runtime.dispatch(client.session(), event).await;
    }

    pub fn disconnect(&self, client: &TestClient) {
        self.runtime.disconnect(client.id());
    }

    pub fn counter(&self) -> u64 {
        self.runtime.coordinator().counter()
    }

    pub fn verifier(&self) -> &V {
        self.runtime.sessions().verifier()
    }

    pub fn store(&self) -> &S {
        self.runtime.coordinator().store()
    }

    pub fn runtime(&self) -> &Arc<Runtime<V, S>> {
        &self.runtime
    }
}
