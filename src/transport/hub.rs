//! Registry of live connections and their outbound channels

use crate::transport::protocol::ServerEvent;
use crate::types::ConnectionId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// Sending half of a connection's outbound queue
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Trait for delivering events to connected clients
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Queue an event for one connection; false if it is gone
    fn send_to(&self, connection_id: &str, event: ServerEvent) -> bool;

    /// Queue an event for every connection, returning how many accepted it
    fn broadcast(&self, event: ServerEvent) -> usize;
}

/// Maps connection ids to the channel feeding their socket writer
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: RwLock<HashMap<ConnectionId, EventSender>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any previous sender under the same id
    pub fn register(&self, connection_id: ConnectionId, sender: EventSender) {
        debug!("Registering connection {}", connection_id);
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection_id, sender);
    }

    /// Drop a connection; returns whether it was registered
    pub fn unregister(&self, connection_id: &str) -> bool {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id)
            .is_some();
        if removed {
            debug!("Unregistered connection {}", connection_id);
        }
        removed
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Notifier for ConnectionHub {
    fn send_to(&self, connection_id: &str, event: ServerEvent) -> bool {
        let connections = self.connections.read().unwrap_or_else(PoisonError::into_inner);
        match connections.get(connection_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    fn broadcast(&self, event: ServerEvent) -> usize {
        let connections = self.connections.read().unwrap_or_else(PoisonError::into_inner);
        connections
            .values()
            .filter(|sender| sender.send(event.clone()).is_ok())
            .count()
    }
}
