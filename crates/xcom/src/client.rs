//! Relay connection client.
//!
//! This module provides the `ChatClient` which handles:
//! - Connecting to the relay over TCP
//! - Sending the handshake name
//! - Forwarding local input lines to the relay
//! - Forwarding relay lines to the console via `ClientEvent`s
//!
//! There is no reconnection: when the relay goes away the reader task
//! reports `ClientEvent::Disconnected` and ends.

use futures::{Sink, SinkExt};
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::LinesCodecError;
use tracing::{debug, info, warn};

use xcom_protocol::{
    is_blank, line_reader, line_writer, read_line, DisplayName, LineRead, DEFAULT_PORT,
};

use crate::error::{ClientError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Where the client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Relay host name or IP address.
    pub host: String,

    /// Relay TCP port.
    pub port: u16,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

// ============================================================================
// Events
// ============================================================================

/// What the client reports to the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The TCP connection is established.
    Connected { host: String, port: u16 },

    /// The next local input line will be used as the display name.
    NamePrompt,

    /// A non-blank line arrived from the relay.
    Line(String),

    /// The relay closed the connection or reading from it failed.
    Disconnected,
}

// ============================================================================
// Chat Client
// ============================================================================

/// Client for one chat session with a relay.
///
/// # Session Lifecycle
///
/// 1. Connect to `host:port`
/// 2. Read the first local input line and send it as the display name
/// 3. Spawn the relay reader task
/// 4. Send every non-blank local input line
/// 5. At the end of local input, shut down the write direction and wait for
///    the relay to close the connection
///
/// # Example
///
/// ```rust,ignore
/// use tokio::sync::mpsc;
/// use xcom_client::{ChatClient, ClientConfig};
///
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let client = ChatClient::new(ClientConfig::new("localhost", 12345), tx);
/// client.run(tokio::io::stdin()).await?;
/// ```
pub struct ChatClient {
    /// Relay address.
    config: ClientConfig,

    /// Channel to send events to the console.
    event_tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChatClient {
    /// Creates a new chat client.
    #[must_use]
    pub fn new(config: ClientConfig, event_tx: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { config, event_tx }
    }

    /// Runs one session, reading local lines from `input`.
    ///
    /// Returns once local input is exhausted and the relay reader task has
    /// finished.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connect` if the relay cannot be reached
    /// - `ClientError::Handshake` if the name cannot be sent
    /// - `ClientError::Input` if local input is not valid UTF-8 text
    pub async fn run<I>(&self, input: I) -> Result<()>
    where
        I: AsyncRead + Unpin,
    {
        let stream = self.connect().await?;
        self.emit(ClientEvent::Connected {
            host: self.config.host.clone(),
            port: self.config.port,
        });

        let (reader, writer) = stream.into_split();
        let mut input = line_reader(input);
        let mut relay = line_writer(writer);

        self.emit(ClientEvent::NamePrompt);
        let name = match read_line(&mut input).await {
            LineRead::Line(line) => DisplayName::from_handshake(&line),
            LineRead::Closed | LineRead::Failed(_) => DisplayName::from_handshake(""),
        };

        relay
            .send(name.as_str())
            .await
            .map_err(|e| ClientError::Handshake(e.to_string()))?;
        info!(name = %name, relay = %self.config.address(), "Handshake sent");

        let reader_task = spawn_relay_reader(reader, self.event_tx.clone());

        let forwarded = forward_input(&mut input, &mut relay).await;

        // Let the relay see our departure; it then closes the connection,
        // which ends the reader task.
        if let Err(e) = SinkExt::<String>::close(&mut relay).await {
            debug!(error = %e, "Failed to shut down relay writer");
        }

        if let Err(e) = reader_task.await {
            warn!(error = %e, "Relay reader task failed");
        }

        forwarded
    }

    /// Resolves and connects to the relay.
    async fn connect(&self) -> Result<TcpStream> {
        let addr = self.config.address();
        debug!(relay = %addr, "Connecting to relay");

        TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| ClientError::Connect {
                addr,
                error: e.to_string(),
            })
    }

    /// Sends an event to the console. A closed console is ignored.
    fn emit(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Sends every non-blank input line to the relay until input ends.
///
/// A failed send means the relay is gone; the reader task reports that, so
/// forwarding just stops.
async fn forward_input<S, W>(input: &mut S, relay: &mut W) -> Result<()>
where
    S: futures::Stream<Item = std::result::Result<String, LinesCodecError>> + Unpin,
    W: Sink<String, Error = LinesCodecError> + Unpin,
{
    loop {
        match read_line(input).await {
            LineRead::Line(line) => {
                if is_blank(&line) {
                    continue;
                }
                if let Err(e) = relay.send(line).await {
                    debug!(error = %e, "Relay write failed, stopping input");
                    return Ok(());
                }
            }
            LineRead::Closed => {
                debug!("Local input exhausted");
                return Ok(());
            }
            LineRead::Failed(e) => return Err(e.into()),
        }
    }
}

/// Spawns the task that forwards relay lines to the console.
fn spawn_relay_reader<R>(reader: R, event_tx: mpsc::UnboundedSender<ClientEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = line_reader(reader);

        loop {
            match read_line(&mut lines).await {
                LineRead::Line(line) => {
                    if !is_blank(&line) {
                        let _ = event_tx.send(ClientEvent::Line(line));
                    }
                }
                LineRead::Closed => {
                    debug!("Relay closed the connection");
                    break;
                }
                LineRead::Failed(e) => {
                    debug!(error = %e, "Relay read failed");
                    break;
                }
            }
        }

        let _ = event_tx.send(ClientEvent::Disconnected);
    })
}
