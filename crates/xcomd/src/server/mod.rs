//! TCP server for the chat relay.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Registers each connection and spawns its reader and writer tasks
//! - Never waits on a client's I/O inside the accept loop
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │  (reader task)  │     │                 │
//! └─────────────────┘     └────────┬────────┘
//!                                  │ outbound queue
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │   writer task   │
//!                         │ (per connection)│
//!                         └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the loop continues

mod connection;
mod writer;

pub use connection::{ConnectionError, ConnectionHandler, Termination};
pub use writer::spawn_writer;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::registry::{Connection, ConnectionId, RegistryHandle};

/// TCP relay server.
///
/// Accepts connections and wires each one to the registry.
pub struct RelayServer {
    /// Bound listener
    listener: TcpListener,

    /// Address the listener actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Server settings
    config: ServerConfig,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Counter for generating connection ids
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address is unavailable.
    pub async fn bind(
        config: ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.bind_addr,
                error: e.to_string(),
            })?;

        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: config.bind_addr,
            error: e.to_string(),
        })?;

        info!(addr = %local_addr, "Relay server listening");

        Ok(Self {
            listener,
            local_addr,
            config,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop until the cancellation token is triggered.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            let connection_id = ConnectionId::new(conn_num + 1);
                            self.handle_connection(stream, peer_addr, connection_id);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!(addr = %self.local_addr, "Relay server stopped");
    }

    /// Spawns the writer and reader tasks for a new connection.
    fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        connection_id: ConnectionId,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(connection = %connection_id, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let (outbox, outbox_rx) = mpsc::channel(self.config.outbound_buffer.max(1));

        spawn_writer(connection_id, writer, outbox_rx, self.config.write_timeout);

        let connection = Connection::new(connection_id, peer_addr, outbox);
        let handler = ConnectionHandler::new(
            connection_id,
            reader,
            self.registry.clone(),
            self.config.idle_timeout,
            self.cancel_token.clone(),
        );
        let registry = self.registry.clone();

        tokio::spawn(async move {
            if let Err(e) = registry.add(connection).await {
                warn!(connection = %connection_id, error = %e, "Failed to register connection");
                return;
            }

            info!(connection = %connection_id, peer = %peer_addr, "New client connected");
            handler.run().await;
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::spawn_registry;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:9000".parse().unwrap(),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("0.0.0.0:9000"));
        assert!(err.to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn test_bind_port_in_use_fails() {
        let registry = spawn_registry();
        let first = RelayServer::bind(
            ServerConfig {
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                ..Default::default()
            },
            registry.clone(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let result = RelayServer::bind(
            ServerConfig {
                bind_addr: first.local_addr(),
                ..Default::default()
            },
            registry,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }
}
