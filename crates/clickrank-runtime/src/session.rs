//! Session lifecycle
//!
//! A session starts unauthenticated. When the handshake carried a
//! credential, resolution runs as a detached task and upgrades the session
//! at most once. Event handlers read the current state synchronously and
//! never wait for resolution; a pending session behaves exactly like an
//! anonymous one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::RwLock;
use tokio::task::JoinHandle;

use clickrank_core::{ClickrankResult, ConnectionId, UserId};
use clickrank_identity::IdentityVerifier;

use crate::{EventReceiver, Fanout};

/// Authentication state of a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// No credential was presented (terminal)
    Anonymous,
    /// Resolution in flight
    Pending,
    /// Credential resolved (terminal)
    Verified(UserId),
    /// Resolution failed (terminal)
    Rejected,
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthState::Pending)
    }
}

/// Per-connection state
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    auth: RwLock<AuthState>,
    connected_at: Instant,
}

impl Session {
    fn new(id: ConnectionId, auth: AuthState) -> Self {
        Session {
            id,
            auth: RwLock::new(auth),
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Resolved identity, if any. Pending and rejected both read as `None`.
    pub fn identity(&self) -> Option<UserId> {
        match &*self.auth.read() {
            AuthState::Verified(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.auth.read(), AuthState::Verified(_))
    }

    pub fn is_auth_pending(&self) -> bool {
        matches!(&*self.auth.read(), AuthState::Pending)
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.read().clone()
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Apply the outcome of resolution. Only a pending session changes;
    /// returns whether the transition happened.
    fn resolve(&self, outcome: &ClickrankResult<UserId>) -> bool {
        let mut auth = self.auth.write();
        if *auth != AuthState::Pending {
            return false;
        }
        *auth = match outcome {
            Ok(user) => AuthState::Verified(user.clone()),
            Err(_) => AuthState::Rejected,
        };
        true
    }
}

/// A freshly accepted connection
#[derive(Debug)]
pub struct Connection {
    pub session: Arc<Session>,
    /// Outbound events for this connection
    pub events: EventReceiver,
    /// Identity resolution task, when a credential was presented
    pub resolution: Option<JoinHandle<()>>,
}

/// Owns the session table and starts identity resolution
pub struct SessionManager<V> {
    verifier: Arc<V>,
    fanout: Arc<Fanout>,
    sessions: RwLock<HashMap<ConnectionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl<V: IdentityVerifier> SessionManager<V> {
    pub fn new(verifier: Arc<V>, fanout: Arc<Fanout>) -> Self {
        SessionManager {
            verifier,
            fanout,
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Accept a connection.
    ///
    /// Returns immediately. With a credential, resolution is spawned on the
    /// current tokio runtime.
    pub fn connect(&self, credential: Option<String>) -> Connection {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let credential = credential.filter(|c| !c.trim().is_empty());

        let initial = if credential.is_some() {
            AuthState::Pending
        } else {
            AuthState::Anonymous
        };
        let session = Arc::new(Session::new(id, initial));

        let events = self.fanout.register(id);
        self.sessions.write().insert(id, Arc::clone(&session));

        let resolution = match credential {
            Some(credential) => Some(self.spawn_resolution(&session, credential)),
            None => {
                tracing::info!(connection = %id, "anonymous session connected");
                None
            }
        };

        Connection {
            session,
            events,
            resolution,
        }
    }

    fn spawn_resolution(&self, session: &Arc<Session>, credential: String) -> JoinHandle<()> {
        let verifier = Arc::clone(&self.verifier);
        let weak: Weak<Session> = Arc::downgrade(session);
        let id = session.id();

        tokio::spawn(async move {
            let outcome = verifier.verify(&credential).await;

            let Some(session) = weak.upgrade() else {
                tracing::debug!(connection = %id, "session gone before identity resolved");
                return;
            };
            if !session.resolve(&outcome) {
                return;
            }
            match outcome {
                Ok(user) => tracing::info!(connection = %id, user = %user, "session authenticated"),
                Err(e) => tracing::warn!(connection = %id, error = %e, "session authentication failed"),
            }
        })
    }

    /// Tear down a connection. In-flight resolution may still finish but
    /// has no further effect.
    pub fn disconnect(&self, id: ConnectionId) -> Option<Arc<Session>> {
        let session = self.sessions.write().remove(&id);
        self.fanout.deregister(id);
        match &session {
            Some(s) => tracing::info!(connection = %id, user = ?s.identity(), "session disconnected"),
            None => tracing::debug!(connection = %id, "disconnect for unknown session"),
        }
        session
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn verifier(&self) -> &Arc<V> {
        &self.verifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickrank_core::{ClickrankError, NewUser};

    /// Accepts credentials of the form `ok:<user>`
    struct PrefixVerifier;

    impl IdentityVerifier for PrefixVerifier {
        async fn verify(&self, credential: &str) -> ClickrankResult<UserId> {
            credential
                .strip_prefix("ok:")
                .map(UserId::from)
                .ok_or(ClickrankError::InvalidCredential)
        }

        async fn create_user(&self, _user: NewUser) -> ClickrankResult<UserId> {
            Err(ClickrankError::Identity("unsupported".into()))
        }
    }

    fn manager() -> SessionManager<PrefixVerifier> {
        SessionManager::new(Arc::new(PrefixVerifier), Arc::new(Fanout::new()))
    }

    #[tokio::test]
    async fn test_no_credential_is_terminally_anonymous() {
        let manager = manager();
        let conn = manager.connect(None);
        assert!(conn.resolution.is_none());
        assert_eq!(conn.session.auth_state(), AuthState::Anonymous);
        assert!(conn.session.auth_state().is_terminal());

        let blank = manager.connect(Some("   ".into()));
        assert!(blank.resolution.is_none());
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_valid_credential_resolves() {
        let manager = manager();
        let conn = manager.connect(Some("ok:u1".into()));
        conn.resolution.unwrap().await.unwrap();

        assert_eq!(conn.session.identity(), Some(UserId::from("u1")));
        assert!(conn.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_invalid_credential_degrades_without_closing() {
        let manager = manager();
        let conn = manager.connect(Some("bogus".into()));
        conn.resolution.unwrap().await.unwrap();

        assert_eq!(conn.session.auth_state(), AuthState::Rejected);
        assert_eq!(conn.session.identity(), None);
        assert!(manager.get(conn.session.id()).is_some());
    }

    #[test]
    fn test_resolution_happens_once() {
        let session = Session::new(ConnectionId::new(1), AuthState::Pending);
        assert!(session.is_auth_pending());
        assert!(session.resolve(&Ok(UserId::from("u1"))));
        assert!(!session.resolve(&Ok(UserId::from("u2"))));
        assert!(!session.resolve(&Err(ClickrankError::InvalidCredential)));
        assert_eq!(session.identity(), Some(UserId::from("u1")));

        let anonymous = Session::new(ConnectionId::new(2), AuthState::Anonymous);
        assert!(!anonymous.resolve(&Ok(UserId::from("u1"))));
        assert_eq!(anonymous.identity(), None);
    }

    #[tokio::test]
    async fn test_disconnect_releases_session() {
        let fanout = Arc::new(Fanout::new());
        let manager = SessionManager::new(Arc::new(PrefixVerifier), Arc::clone(&fanout));
        let conn = manager.connect(None);
        let id = conn.session.id();
        assert!(fanout.contains(id));

        assert!(manager.disconnect(id).is_some());
        assert!(manager.get(id).is_none());
        assert!(!fanout.contains(id));
        assert!(manager.disconnect(id).is_none());
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let manager = manager();
        let a = manager.connect(None);
        let b = manager.connect(None);
        assert_ne!(a.session.id(), b.session.id());
    }
}
