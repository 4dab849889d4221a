//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RelayEvent`: Events published for the server's local observer
//! - `BroadcastReport`: Per-broadcast delivery counts

use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::oneshot;

use xcom_protocol::{ChatLine, DisplayName};

use super::connection::{Connection, ConnectionId, ConnectionInfo};

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command that produces a result carries a oneshot channel for the
/// response. The actor handles commands one at a time, so every command is
/// atomic with respect to every other.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Insert a newly accepted connection.
    ///
    /// # Errors
    /// - `RegistryError::AlreadyRegistered` if the id is already present
    Add {
        /// The connection to insert (boxed to keep the enum small)
        connection: Box<Connection>,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a connection. Absent ids are a no-op.
    Remove {
        /// Connection to remove
        connection_id: ConnectionId,
        /// Receives true if the connection was present
        respond_to: oneshot::Sender<bool>,
    },

    /// Record a connection's display name.
    ///
    /// # Errors
    /// - `RegistryError::NotFound` if the connection is not registered
    /// - `RegistryError::NameAlreadySet` if a name was recorded before
    SetName {
        connection_id: ConnectionId,
        name: DisplayName,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Look up a connection's display name.
    NameOf {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Option<DisplayName>>,
    },

    /// Get views of every registered connection, ordered by id.
    Snapshot {
        respond_to: oneshot::Sender<Vec<ConnectionInfo>>,
    },

    /// Enqueue one line to every registered connection.
    Broadcast {
        /// Line to render and send
        line: ChatLine,
        /// Receives the delivery counts
        respond_to: oneshot::Sender<BroadcastReport>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A connection with this id is already registered.
    #[error("connection already registered: {0}")]
    AlreadyRegistered(ConnectionId),

    /// The connection is not registered.
    #[error("connection not found: {0}")]
    NotFound(ConnectionId),

    /// The connection already has a display name.
    #[error("display name already set for {0}")]
    NameAlreadySet(ConnectionId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Broadcast Report
// ============================================================================

/// Delivery counts for a single broadcast.
///
/// `dropped` counts recipients whose outbound queue was full or whose
/// writer task had already stopped. Those recipients stay registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub delivered: usize,
    pub dropped: usize,
}

// ============================================================================
// Relay Events
// ============================================================================

/// Events published by the registry for the server's local observer.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A connection was registered.
    Connected {
        connection_id: ConnectionId,
        peer_addr: SocketAddr,
    },

    /// A connection completed its handshake.
    Named {
        connection_id: ConnectionId,
        name: DisplayName,
    },

    /// A line was fanned out to the registry.
    Broadcast { line: ChatLine, report: BroadcastReport },

    /// A connection was removed from the registry.
    Disconnected {
        connection_id: ConnectionId,
        name: Option<DisplayName>,
    },
}
