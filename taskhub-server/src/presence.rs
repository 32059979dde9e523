//! In-memory registry of live connections, keyed by principal.
//!
//! Ephemeral by design: the registry starts empty on process start and is
//! mutated only by connect/disconnect events. At most one connection per
//! principal is tracked; a second registration for the same principal
//! replaces the first (last write wins).

use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use taskhub_core::ids::UserId;
use taskhub_core::protocol::ServerEvent;

/// A live connection handle: the channel feeding a socket's writer task,
/// plus an id that identifies this particular socket for disconnect cleanup.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Identifies this socket, so tearing down an old socket cannot evict a
    /// newer registration for the same user.
    pub conn_id: Uuid,
    /// Sender half of the connection's outbound event channel.
    pub tx: mpsc::UnboundedSender<ServerEvent>,
}

impl Connection {
    /// Creates a connection handle with a fresh id.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            conn_id: Uuid::now_v7(),
            tx,
        }
    }
}

/// Registry mapping each online principal to their live connection.
///
/// Explicitly owned and constructor-injected into the messaging engine;
/// mutations are serialized through the inner [`RwLock`].
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections: RwLock<HashMap<UserId, Connection>>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or replaces the live connection for a principal.
    ///
    /// Returns the previous connection if one was replaced; dropping its
    /// sender closes the old socket's writer channel.
    pub async fn register(&self, user_id: UserId, connection: Connection) -> Option<Connection> {
        let mut conns = self.connections.write().await;
        conns.insert(user_id, connection)
    }

    /// Returns the live connection for a principal, if online.
    pub async fn lookup(&self, user_id: &UserId) -> Option<Connection> {
        let conns = self.connections.read().await;
        conns.get(user_id).cloned()
    }

    /// Evicts whichever principal is mapped to the given socket.
    ///
    /// Disconnect cleanup: scans the registry (O(n), fine at expected
    /// scale) and removes the entry only if it still belongs to this
    /// socket. Returns the evicted principal, or `None` if the socket was
    /// already replaced or never registered.
    pub async fn remove_connection(&self, conn_id: Uuid) -> Option<UserId> {
        let mut conns = self.connections.write().await;
        let user_id = conns
            .iter()
            .find(|(_, c)| c.conn_id == conn_id)
            .map(|(u, _)| u.clone())?;
        conns.remove(&user_id);
        Some(user_id)
    }

    /// Evicts a principal directly, used when a push to their connection
    /// fails and the handle is known stale.
    pub async fn remove_user(&self, user_id: &UserId) -> Option<Connection> {
        let mut conns = self.connections.write().await;
        conns.remove(user_id)
    }

    /// Number of currently registered principals.
    pub async fn online_count(&self) -> usize {
        let conns = self.connections.read().await;
        conns.len()
    }
}
