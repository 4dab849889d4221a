//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor and subscribing to relay events. It is the
//! only way to reach the connection map, so all access goes through the
//! actor's single command loop.

use tokio::sync::{broadcast, mpsc, oneshot};

use xcom_protocol::{ChatLine, DisplayName};

use super::commands::{BroadcastReport, RegistryCommand, RegistryError, RelayEvent};
use super::connection::{Connection, ConnectionId, ConnectionInfo};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// # Usage
///
/// ```ignore
/// let handle = spawn_registry();
///
/// handle.add(connection).await?;
/// let name = DisplayName::from_handshake("alice");
/// handle.set_name(id, name.clone()).await?;
/// let report = handle.broadcast(ChatLine::Joined { name }).await;
/// handle.remove(id).await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<RelayEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<RelayEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Register a newly accepted connection.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyRegistered` if the id is already present
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn add(&self, connection: Connection) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Add {
                connection: Box::new(connection),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a connection.
    ///
    /// Returns true if the connection was registered. Removing an absent
    /// connection, or removing after the actor stopped, returns false.
    pub async fn remove(&self, connection_id: ConnectionId) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Remove {
                connection_id,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Record a connection's display name.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotFound` if the connection is not registered
    /// - `RegistryError::NameAlreadySet` if a name was recorded before
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn set_name(
        &self,
        connection_id: ConnectionId,
        name: DisplayName,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::SetName {
                connection_id,
                name,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Look up a connection's display name.
    ///
    /// Returns `None` if the connection is absent, unnamed, or if
    /// communication with the actor fails.
    pub async fn name_of(&self, connection_id: ConnectionId) -> Option<DisplayName> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::NameOf {
                connection_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Get views of all registered connections, ordered by id.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<ConnectionInfo> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.snapshot().await.len()
    }

    /// Send one chat line to every registered connection.
    ///
    /// Per-recipient failures are counted in the report, never returned.
    /// Returns an empty report if the actor has shut down.
    pub async fn broadcast(&self, line: ChatLine) -> BroadcastReport {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Broadcast {
                line,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return BroadcastReport::default();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribe to relay events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the registry actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
