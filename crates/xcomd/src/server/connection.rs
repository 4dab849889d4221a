//! Reader task for individual client connections.
//!
//! Each accepted connection gets its own `ConnectionHandler` that:
//! - Reads the handshake line and records the display name
//! - Broadcasts every non-blank line the peer sends
//! - Removes its connection from the registry when the stream ends
//!
//! The handler is the only code that removes its connection, so each
//! connection is removed exactly once.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Read errors end this connection only

use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use xcom_protocol::{is_blank, line_reader, read_line, ChatLine, DisplayName, FrameError, LineRead};

use crate::registry::{ConnectionId, RegistryError, RegistryHandle};

/// Reader task for a single connection.
pub struct ConnectionHandler<R> {
    /// Connection this task owns
    connection_id: ConnectionId,

    /// Line decoder over the read half of the socket
    lines: FramedRead<R, LinesCodec>,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Optional limit on how long a peer may stay silent
    idle_timeout: Option<Duration>,

    /// Cancellation token for server shutdown
    cancel_token: CancellationToken,

    /// Whether a join line was broadcast for this connection
    announced: bool,
}

/// Why a reader task stopped.
#[derive(Debug)]
pub enum Termination {
    /// The peer closed the stream.
    Closed,

    /// The server is shutting down.
    Cancelled,

    /// Reading failed or the registry refused the connection.
    Failed(ConnectionError),
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a new reader task.
    ///
    /// # Arguments
    ///
    /// * `connection_id` - Registered connection this task owns
    /// * `reader` - Read half of the peer's stream
    /// * `registry` - Handle to the connection registry
    /// * `idle_timeout` - Optional read inactivity limit
    /// * `cancel_token` - Token for server shutdown
    pub fn new(
        connection_id: ConnectionId,
        reader: R,
        registry: RegistryHandle,
        idle_timeout: Option<Duration>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            connection_id,
            lines: line_reader(reader),
            registry,
            idle_timeout,
            cancel_token,
            announced: false,
        }
    }

    /// Runs the reader task until the stream ends.
    ///
    /// The connection must already be registered. On return it has been
    /// removed from the registry and, if it had joined, its departure has
    /// been broadcast.
    pub async fn run(mut self) -> Termination {
        debug!(connection = %self.connection_id, "Reader task started");

        let termination = self.serve().await;

        match &termination {
            Termination::Closed => {
                debug!(connection = %self.connection_id, "Client closed the stream");
            }
            Termination::Cancelled => {
                debug!(connection = %self.connection_id, "Reader task cancelled");
            }
            Termination::Failed(e) => {
                debug!(connection = %self.connection_id, error = %e, "Connection failed");
            }
        }

        let removed = self.registry.remove(self.connection_id).await;
        if self.announced {
            self.registry.broadcast(ChatLine::Left).await;
        }

        info!(
            connection = %self.connection_id,
            removed,
            announced = self.announced,
            "Client disconnected"
        );

        termination
    }

    /// Handshake followed by the message loop.
    async fn serve(&mut self) -> Termination {
        let handshake = match self.next_line().await {
            Ok(line) => line,
            Err(termination) => return termination,
        };

        let name = DisplayName::from_handshake(&handshake);
        if let Err(e) = self.registry.set_name(self.connection_id, name.clone()).await {
            return Termination::Failed(e.into());
        }

        info!(connection = %self.connection_id, name = %name, "Client joined");
        self.registry
            .broadcast(ChatLine::Joined { name: name.clone() })
            .await;
        self.announced = true;

        loop {
            let line = match self.next_line().await {
                Ok(line) => line,
                Err(termination) => return termination,
            };

            if is_blank(&line) {
                continue;
            }

            let report = self
                .registry
                .broadcast(ChatLine::Text {
                    name: name.clone(),
                    text: line,
                })
                .await;

            debug!(
                connection = %self.connection_id,
                delivered = report.delivered,
                dropped = report.dropped,
                "Relayed message"
            );
        }
    }

    /// Reads the next line, or the reason there will be no more.
    async fn next_line(&mut self) -> Result<String, Termination> {
        let idle_timeout = self.idle_timeout;
        let lines = &mut self.lines;

        let read = async move {
            match idle_timeout {
                Some(limit) => timeout(limit, read_line(lines))
                    .await
                    .map_err(|_| ConnectionError::IdleTimeout),
                None => Ok(read_line(lines).await),
            }
        };

        tokio::select! {
            _ = self.cancel_token.cancelled() => Err(Termination::Cancelled),
            result = read => match result {
                Ok(LineRead::Line(line)) => Ok(line),
                Ok(LineRead::Closed) => Err(Termination::Closed),
                Ok(LineRead::Failed(e)) => Err(Termination::Failed(e.into())),
                Err(e) => Err(Termination::Failed(e)),
            },
        }
    }
}

/// Errors that end a connection's reader task.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Read error: {0}")]
    Frame(#[from] FrameError),

    #[error("Idle timeout")]
    IdleTimeout,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use futures::SinkExt;
    use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio_util::codec::FramedWrite;

    use crate::registry::{spawn_registry, Connection};
    use xcom_protocol::line_writer;

    const WAIT: Duration = Duration::from_secs(2);

    struct Peer {
        id: ConnectionId,
        to_server: FramedWrite<WriteHalf<DuplexStream>, LinesCodec>,
        from_server: mpsc::Receiver<String>,
        task: JoinHandle<Termination>,
    }

    /// Registers a synthetic connection and starts its reader task.
    async fn attach(
        registry: &RegistryHandle,
        id: u64,
        idle_timeout: Option<Duration>,
    ) -> Peer {
        let (client, server) = duplex(1024);
        let (server_read, _server_write): (ReadHalf<DuplexStream>, _) = split(server);
        let (_client_read, client_write) = split(client);

        let (outbox, from_server) = mpsc::channel(64);
        let addr: SocketAddr = format!("127.0.0.1:{}", 7000 + id).parse().unwrap();
        let id = ConnectionId::new(id);
        registry
            .add(Connection::new(id, addr, outbox))
            .await
            .unwrap();

        let handler = ConnectionHandler::new(
            id,
            server_read,
            registry.clone(),
            idle_timeout,
            CancellationToken::new(),
        );

        Peer {
            id,
            to_server: line_writer(client_write),
            from_server,
            task: tokio::spawn(handler.run()),
        }
    }

    async fn recv(peer: &mut Peer) -> String {
        timeout(WAIT, peer.from_server.recv())
            .await
            .expect("timed out waiting for line")
            .expect("outbox closed")
    }

    #[tokio::test]
    async fn test_handshake_sets_name_and_announces() {
        let registry = spawn_registry();
        let mut alice = attach(&registry, 1, None).await;

        alice.to_server.send("alice").await.unwrap();

        assert_eq!(recv(&mut alice).await, "alice has joined the chat.");
        assert_eq!(
            registry.name_of(alice.id).await.unwrap().as_str(),
            "alice"
        );
    }

    #[tokio::test]
    async fn test_blank_handshake_uses_default_name() {
        let registry = spawn_registry();
        let mut peer = attach(&registry, 1, None).await;

        peer.to_server.send("").await.unwrap();

        assert_eq!(recv(&mut peer).await, "Unknown has joined the chat.");
    }

    #[tokio::test]
    async fn test_blank_lines_are_not_broadcast() {
        let registry = spawn_registry();
        let mut alice = attach(&registry, 1, None).await;

        alice.to_server.send("alice").await.unwrap();
        alice.to_server.send("").await.unwrap();
        alice.to_server.send("   ").await.unwrap();
        alice.to_server.send("hello").await.unwrap();

        assert_eq!(recv(&mut alice).await, "alice has joined the chat.");
        assert_eq!(recv(&mut alice).await, "alice: hello");
    }

    #[tokio::test]
    async fn test_close_after_join_removes_and_announces() {
        let registry = spawn_registry();
        let mut alice = attach(&registry, 1, None).await;
        let mut bob = attach(&registry, 2, None).await;

        alice.to_server.send("alice").await.unwrap();
        assert_eq!(recv(&mut bob).await, "alice has joined the chat.");

        drop(alice.to_server);
        let termination = timeout(WAIT, alice.task).await.unwrap().unwrap();

        assert!(matches!(termination, Termination::Closed));
        assert_eq!(recv(&mut bob).await, "A user has left the chat.");
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_before_handshake_is_silent() {
        let registry = spawn_registry();
        let lurker = attach(&registry, 1, None).await;
        let mut bob = attach(&registry, 2, None).await;

        drop(lurker.to_server);
        timeout(WAIT, lurker.task).await.unwrap().unwrap();

        assert_eq!(registry.connection_count().await, 1);
        assert!(bob.from_server.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_idle_timeout_disconnects() {
        let registry = spawn_registry();
        let peer = attach(&registry, 1, Some(Duration::from_millis(50))).await;

        let termination = timeout(WAIT, peer.task).await.unwrap().unwrap();

        assert!(matches!(
            termination,
            Termination::Failed(ConnectionError::IdleTimeout)
        ));
        assert_eq!(registry.connection_count().await, 0);
    }

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::Frame(FrameError::Io("connection reset".to_string()));
        assert!(err.to_string().contains("connection reset"));
    }
}
