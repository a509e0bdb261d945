//! Runtime facade - event dispatch over sessions and the coordinator

use std::sync::Arc;

use clickrank_core::{
    ClickrankResult, ClientEvent, ConnectionId, CoordinatorConfig, NewUserRequest, ServerEvent,
    UserId,
};
use clickrank_identity::IdentityVerifier;
use clickrank_store::ScoreStore;

use crate::{Connection, Coordinator, Fanout, Session, SessionManager};

/// Point-in-time view of the runtime
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub connections: usize,
    pub counter: u64,
}

/// The clickrank runtime: one per process
pub struct Runtime<V, S> {
    sessions: SessionManager<V>,
    coordinator: Coordinator<S>,
    fanout: Arc<Fanout>,
}

impl<V: IdentityVerifier, S: ScoreStore> Runtime<V, S> {
    /// Wire collaborators together and seed the counter
    pub async fn start(verifier: Arc<V>, store: Arc<S>, config: CoordinatorConfig) -> ClickrankResult<Self> {
        let fanout = Arc::new(Fanout::with_capacity(config.outbound_capacity));
        let coordinator = Coordinator::start(store, Arc::clone(&fanout), config).await?;
        let sessions = SessionManager::new(verifier, Arc::clone(&fanout));
        Ok(Runtime {
            sessions,
            coordinator,
            fanout,
        })
    }

    /// Accept a connection; see [`SessionManager::connect`]
    pub fn connect(&self, credential: Option<String>) -> Connection {
        self.sessions.connect(credential)
    }

    /// Handle one client event for a session
    pub async fn dispatch(&self, session: &Session, event: ClientEvent) {
        tracing::debug!(
            connection = %session.id(),
            event = event.name(),
            authenticated = session.is_authenticated(),
            "client event"
        );
        match event {
            ClientEvent::RequestRanking => {
                let ranking = self.coordinator.request_ranking().await;
                self.reply(session, ServerEvent::RankingSnapshot(ranking));
            }
            ClientEvent::RequestOwnCount => {
                let count = self.coordinator.request_own_count(session).await;
                self.reply(session, ServerEvent::OwnCount(count));
            }
            ClientEvent::Click => {
                self.coordinator.record_click(session).await;
            }
        }
    }

    fn reply(&self, session: &Session, event: ServerEvent) {
        if !self.fanout.send_to(session.id(), event) {
            tracing::debug!(connection = %session.id(), "reply dropped: session gone");
        }
    }

    /// Tear down a connection
    pub fn disconnect(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.disconnect(id)
    }

    /// Administrative account creation.
    ///
    /// Validation failures return before the identity provider is called.
    pub async fn create_user(&self, request: NewUserRequest) -> ClickrankResult<UserId> {
        let user = request.validate()?;
        self.sessions.verifier().create_user(user).await
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            connections: self.sessions.len(),
            counter: self.coordinator.counter(),
        }
    }

    pub fn sessions(&self) -> &SessionManager<V> {
        &self.sessions
    }

    pub fn coordinator(&self) -> &Coordinator<S> {
        &self.coordinator
    }

    pub fn fanout(&self) -> &Arc<Fanout> {
        &self.fanout
    }
}
