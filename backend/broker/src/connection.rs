//! Active connection registry.
//!
//! Maps connection ids to their outbound senders and routes messages to
//! them. Sends to a connection that has gone away return `false` and are
//! otherwise dropped silently; late OCR results for disconnected peers
//! land here.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use vigil_core::ServerMessage;

use crate::registry::ConnectionId;

pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, ClientSender>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: ConnectionId, sender: ClientSender) {
        let mut w = self.connections.write().await;
        w.insert(id, sender);
    }

    /// Remove a connection. Returns whether it was still present, which
    /// makes disconnect handling idempotent for the caller.
    pub async fn unregister(&self, id: &ConnectionId) -> bool {
        let mut w = self.connections.write().await;
        w.remove(id).is_some()
    }

    /// Send to one connection. `false` when the peer is gone or its channel
    /// is closed.
    pub async fn send_to(&self, id: &ConnectionId, msg: ServerMessage) -> bool {
        let r = self.connections.read().await;
        match r.get(id) {
            Some(sender) => sender.send(msg).is_ok(),
            None => false,
        }
    }

    /// Fan one message out to several connections, skipping any that have
    /// disappeared.
    pub async fn send_to_many(&self, ids: &[ConnectionId], msg: &ServerMessage) {
        let r = self.connections.read().await;
        for id in ids {
            if let Some(sender) = r.get(id) {
                let _ = sender.send(msg.clone());
            }
        }
    }

    pub async fn ids(&self) -> HashSet<ConnectionId> {
        self.connections.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
