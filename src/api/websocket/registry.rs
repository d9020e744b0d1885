//! Client connection registry
//!
//! Tracks the set of currently-open WebSocket connections for the fan-out
//! broadcaster. A connection is present exactly while its transport is open:
//! the socket task adds itself on upgrade and removes itself synchronously
//! on close or error, so a broadcast snapshot never includes a connection
//! whose close has already been observed.
//!
//! The lock is only ever held to mutate or clone the map, never across an
//! await point.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// One open client connection
#[derive(Clone)]
pub struct ClientHandle {
    pub id: u64,
    pub opened_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<Message>,
}

impl ClientHandle {
    /// Whether the transport still reports an open, writable state
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a message for the client. Returns false if the connection has
    /// gone away; the caller skips it, nothing more.
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Registry of currently-open client connections
#[derive(Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: RwLock<HashMap<u64, ClientHandle>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly-opened connection, returning its id
    pub fn add(&self, sender: mpsc::UnboundedSender<Message>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = ClientHandle {
            id,
            opened_at: Utc::now(),
            sender,
        };
        self.clients.write().insert(id, handle);
        id
    }

    /// Remove a connection; called synchronously from the socket task when
    /// its transport reports close or error.
    pub fn remove(&self, id: u64) -> bool {
        self.clients.write().remove(&id).is_some()
    }

    /// Read-consistent view of the open connections for broadcast iteration
    pub fn snapshot(&self) -> Vec<ClientHandle> {
        self.clients.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_remove() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = registry.add(tx);
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(id));
        assert!(registry.is_empty());
        // Removing twice is a no-op
        assert!(!registry.remove(id));
    }

    #[tokio::test]
    async fn test_removed_client_is_absent_from_next_snapshot() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let first = registry.add(tx);
        let second = registry.add(tx2);

        registry.remove(first);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, second);
    }

    #[tokio::test]
    async fn test_closed_receiver_reports_not_open() {
        let registry = ClientRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.add(tx);

        drop(rx);
        let snapshot = registry.snapshot();
        assert!(!snapshot[0].is_open());
        assert!(!snapshot[0].send(Message::Text("late".to_string())));
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = registry.add(tx.clone());
        let b = registry.add(tx);
        assert_ne!(a, b);
    }
}
