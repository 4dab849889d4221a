//! The unit of registration: one accepted peer.

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use xcom_protocol::DisplayName;

/// Sending side of a connection's bounded outbound queue.
///
/// The registry holds this; the connection's writer task drains the
/// matching receiver onto the socket.
pub type Outbox = mpsc::Sender<String>;

/// Process-unique identifier assigned to each accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A live peer as the registry sees it.
///
/// The display name starts out empty and is set once, after the handshake
/// line has been read.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    name: Option<DisplayName>,
    outbox: Outbox,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Creates an unnamed connection.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier assigned by the accept loop
    /// * `peer_addr` - Remote address of the socket
    /// * `outbox` - Queue feeding this connection's writer task
    pub fn new(id: ConnectionId, peer_addr: SocketAddr, outbox: Outbox) -> Self {
        Self {
            id,
            peer_addr,
            name: None,
            outbox,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> Option<&DisplayName> {
        self.name.as_ref()
    }

    /// Records the display name. Returns false if one was already set.
    pub(crate) fn set_name(&mut self, name: DisplayName) -> bool {
        if self.name.is_some() {
            return false;
        }
        self.name = Some(name);
        true
    }

    pub(crate) fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Returns a read-only view of this connection.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            peer_addr: self.peer_addr,
            name: self.name.clone(),
            connected_at: self.connected_at,
        }
    }
}

/// Read-only view of a registered connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub name: Option<DisplayName>,
    pub connected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_name_is_set_once() {
        let (tx, _rx) = mpsc::channel(1);
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let mut conn = Connection::new(ConnectionId::new(1), addr, tx);

        assert!(conn.name().is_none());
        assert!(conn.set_name(DisplayName::from_handshake("alice")));
        assert!(!conn.set_name(DisplayName::from_handshake("mallory")));
        assert_eq!(conn.info().name.unwrap().as_str(), "alice");
    }
}
