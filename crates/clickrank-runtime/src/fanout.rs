//! Fan-out registry
//!
//! Every connected session owns a bounded outbound queue. Direct replies
//! and broadcasts both go through it, so a session sees its events in the
//! order the runtime produced them. A session whose queue is full is not
//! waited for: it is dropped from the registry, its receiver drains what
//! was already queued and then reports the queue closed.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use clickrank_core::{ConnectionId, ServerEvent, DEFAULT_OUTBOUND_CAPACITY};

/// Sending half of a session's outbound queue
pub type EventSender = mpsc::Sender<ServerEvent>;

/// Receiving half, drained by the transport
pub type EventReceiver = mpsc::Receiver<ServerEvent>;

/// Registry of outbound queues keyed by connection
#[derive(Debug)]
pub struct Fanout {
    sinks: RwLock<HashMap<ConnectionId, EventSender>>,
    capacity: usize,
}

impl Default for Fanout {
    fn default() -> Self {
        Fanout::with_capacity(DEFAULT_OUTBOUND_CAPACITY)
    }
}

impl Fanout {
    pub fn new() -> Self {
        Fanout::default()
    }

    /// Registry whose queues hold at most `capacity` undelivered events
    pub fn with_capacity(capacity: usize) -> Self {
        Fanout {
            sinks: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a connection and get its receiver.
    /// Re-registering an id replaces the previous queue.
    pub fn register(&self, id: ConnectionId) -> EventReceiver {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.sinks.write().insert(id, tx);
        rx
    }

    /// Remove a connection. Returns false if it was not registered.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        self.sinks.write().remove(&id).is_some()
    }

    /// Send to one connection
    pub fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let outcome = match self.sinks.read().get(&id) {
            Some(tx) => tx.try_send(event),
            None => return false,
        };
        match outcome {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.evict(id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Send to every registered connection, returning how many accepted it
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        let mut full = Vec::new();
        {
            let sinks = self.sinks.read();
            for (id, tx) in sinks.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => full.push(*id),
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }
        for id in full {
            self.evict(id);
        }
        tracing::debug!(event = event.name(), delivered, "broadcast");
        delivered
    }

    fn evict(&self, id: ConnectionId) {
        if self.deregister(id) {
            tracing::warn!(connection = %id, capacity = self.capacity, "outbound queue full, dropping slow session");
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sinks.read().contains_key(&id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }
}
