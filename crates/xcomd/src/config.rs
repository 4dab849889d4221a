//! Relay configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use xcom_protocol::DEFAULT_PORT;

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Default time allowed for one socket write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the relay server.
///
/// # Example
///
/// ```rust
/// use xcomd::config::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig {
///     idle_timeout: Some(Duration::from_secs(600)),
///     ..ServerConfig::with_port(9000)
/// };
/// assert_eq!(config.bind_addr.port(), 9000);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: SocketAddr,

    /// Lines buffered per connection before further broadcasts to it are
    /// dropped.
    pub outbound_buffer: usize,

    /// Time allowed for one socket write before the writer gives up.
    pub write_timeout: Duration,

    /// Disconnect peers that send nothing for this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Listen on all IPv4 interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            ..Default::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            idle_timeout: None,
        }
    }
}
