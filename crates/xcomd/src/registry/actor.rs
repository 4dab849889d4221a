//! Registry actor - owns all connection state and processes commands.
//!
//! The RegistryActor is the single owner of the connection map. It receives
//! commands via an mpsc channel, handles them one at a time, and publishes
//! events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the caller went away)

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use xcom_protocol::{ChatLine, DisplayName};

use super::commands::{BroadcastReport, RegistryCommand, RegistryError, RelayEvent};
use super::connection::{Connection, ConnectionId, ConnectionInfo};
use super::fanout::fan_out;

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all connection state.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially.
/// Membership changes, name changes, and broadcast fan-out therefore never
/// interleave: a broadcast reaches exactly the connections registered when
/// its command is handled, and two broadcasts reach every shared recipient's
/// queue in the order they were handled.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Live connections keyed by id
    connections: HashMap<ConnectionId, Connection>,

    /// Event publisher for the local observer
    event_publisher: broadcast::Sender<RelayEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<RelayEvent>,
    ) -> Self {
        Self {
            receiver,
            connections: HashMap::new(),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            connections = self.connections.len(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add {
                connection,
                respond_to,
            } => {
                let result = self.handle_add(*connection);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                connection_id,
                respond_to,
            } => {
                let removed = self.handle_remove(connection_id);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::SetName {
                connection_id,
                name,
                respond_to,
            } => {
                let result = self.handle_set_name(connection_id, name);
                let _ = respond_to.send(result);
            }
            RegistryCommand::NameOf {
                connection_id,
                respond_to,
            } => {
                let name = self
                    .connections
                    .get(&connection_id)
                    .and_then(|c| c.name().cloned());
                let _ = respond_to.send(name);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.handle_snapshot());
            }
            RegistryCommand::Broadcast { line, respond_to } => {
                let report = self.handle_broadcast(line);
                let _ = respond_to.send(report);
            }
        }
    }

    fn handle_add(&mut self, connection: Connection) -> Result<(), RegistryError> {
        let connection_id = connection.id();

        if self.connections.contains_key(&connection_id) {
            warn!(connection = %connection_id, "Duplicate registration rejected");
            return Err(RegistryError::AlreadyRegistered(connection_id));
        }

        let info = connection.info();
        self.connections.insert(connection_id, connection);

        debug!(
            connection = %connection_id,
            peer = %info.peer_addr,
            total = self.connections.len(),
            "Connection registered"
        );

        self.publish(RelayEvent::Connected {
            connection_id,
            peer_addr: info.peer_addr,
        });

        Ok(())
    }

    fn handle_remove(&mut self, connection_id: ConnectionId) -> bool {
        let Some(connection) = self.connections.remove(&connection_id) else {
            debug!(connection = %connection_id, "Remove of absent connection ignored");
            return false;
        };

        let info = connection.info();
        let connected_for = chrono::Utc::now() - info.connected_at;

        debug!(
            connection = %connection_id,
            name = ?info.name,
            connected_secs = connected_for.num_seconds(),
            total = self.connections.len(),
            "Connection removed"
        );

        self.publish(RelayEvent::Disconnected {
            connection_id,
            name: info.name,
        });

        true
    }

    fn handle_set_name(
        &mut self,
        connection_id: ConnectionId,
        name: DisplayName,
    ) -> Result<(), RegistryError> {
        let connection = self
            .connections
            .get_mut(&connection_id)
            .ok_or(RegistryError::NotFound(connection_id))?;

        if !connection.set_name(name.clone()) {
            return Err(RegistryError::NameAlreadySet(connection_id));
        }

        self.publish(RelayEvent::Named {
            connection_id,
            name,
        });

        Ok(())
    }

    fn handle_snapshot(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> =
            self.connections.values().map(Connection::info).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    fn handle_broadcast(&mut self, line: ChatLine) -> BroadcastReport {
        let report = fan_out(self.connections.values(), &line.to_string());

        if report.dropped > 0 {
            debug!(
                delivered = report.delivered,
                dropped = report.dropped,
                "Broadcast partially delivered"
            );
        }

        self.publish(RelayEvent::Broadcast { line, report });
        report
    }

    /// Publishes an event. Having no subscribers is not an error.
    fn publish(&self, event: RelayEvent) {
        let _ = self.event_publisher.send(event);
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of connections currently registered.
    #[cfg(test)]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::oneshot;

    fn create_connection(id: u64) -> (Connection, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let addr: SocketAddr = format!("127.0.0.1:{}", 6000 + id).parse().unwrap();
        (Connection::new(ConnectionId::new(id), addr, tx), rx)
    }

    fn create_actor() -> (RegistryActor, broadcast::Receiver<RelayEvent>) {
        let (_cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(16);
        (RegistryActor::new(cmd_rx, event_tx), event_rx)
    }

    fn add(
        actor: &mut RegistryActor,
        connection: Connection,
    ) -> oneshot::Receiver<Result<(), RegistryError>> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Add {
            connection: Box::new(connection),
            respond_to: tx,
        });
        rx
    }

    #[tokio::test]
    async fn test_add_connection() {
        let (mut actor, mut event_rx) = create_actor();
        let (conn, _rx) = create_connection(1);

        let result = add(&mut actor, conn).await.unwrap();
        assert!(result.is_ok());
        assert_eq!(actor.connection_count(), 1);

        let event = event_rx.try_recv().unwrap();
        assert!(matches!(event, RelayEvent::Connected { .. }));
    }

    #[tokio::test]
    async fn test_add_duplicate_fails() {
        let (mut actor, _) = create_actor();
        let (first, _rx1) = create_connection(1);
        let (second, _rx2) = create_connection(1);

        add(&mut actor, first).await.unwrap().unwrap();
        let result = add(&mut actor, second).await.unwrap();

        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
        assert_eq!(actor.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_twice_is_noop() {
        let (mut actor, mut event_rx) = create_actor();
        let (conn, _rx) = create_connection(1);
        add(&mut actor, conn).await.unwrap().unwrap();
        let _ = event_rx.try_recv();

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Remove {
            connection_id: ConnectionId::new(1),
            respond_to: tx,
        });
        assert!(rx.await.unwrap());

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Remove {
            connection_id: ConnectionId::new(1),
            respond_to: tx,
        });
        assert!(!rx.await.unwrap());

        // Only the first removal is announced
        assert!(matches!(
            event_rx.try_recv().unwrap(),
            RelayEvent::Disconnected { .. }
        ));
        assert!(event_rx.try_recv().is_err());
        assert_eq!(actor.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_set_name_and_name_of() {
        let (mut actor, _) = create_actor();
        let (conn, _rx) = create_connection(1);
        add(&mut actor, conn).await.unwrap().unwrap();

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::SetName {
            connection_id: ConnectionId::new(1),
            name: DisplayName::from_handshake("alice"),
            respond_to: tx,
        });
        assert!(rx.await.unwrap().is_ok());

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::NameOf {
            connection_id: ConnectionId::new(1),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap().unwrap().as_str(), "alice");
    }

    #[tokio::test]
    async fn test_set_name_unknown_connection() {
        let (mut actor, _) = create_actor();

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::SetName {
            connection_id: ConnectionId::new(42),
            name: DisplayName::from_handshake("ghost"),
            respond_to: tx,
        });

        assert!(matches!(
            rx.await.unwrap(),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_unnamed_connections() {
        let (mut actor, _) = create_actor();
        let (a, mut rx_a) = create_connection(1);
        let (b, mut rx_b) = create_connection(2);
        add(&mut actor, a).await.unwrap().unwrap();
        add(&mut actor, b).await.unwrap().unwrap();

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Broadcast {
            line: ChatLine::Joined {
                name: DisplayName::from_handshake("alice"),
            },
            respond_to: tx,
        });

        let report = rx.await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(rx_a.try_recv().unwrap(), "alice has joined the chat.");
        assert_eq!(rx_b.try_recv().unwrap(), "alice has joined the chat.");
    }

    #[tokio::test]
    async fn test_snapshot_sorted_by_id() {
        let (mut actor, _) = create_actor();
        for id in [3, 1, 2] {
            let (conn, _rx) = create_connection(id);
            add(&mut actor, conn).await.unwrap().unwrap();
        }

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Snapshot { respond_to: tx });

        let ids: Vec<u64> = rx.await.unwrap().iter().map(|i| i.id.as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
