//! Connection registry using the Actor pattern.
//!
//! The registry is the central state manager for all live connections. It
//! receives commands via a tokio mpsc channel and is the only place the
//! connection map is read or mutated.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  Reader Tasks   │────▶│  RegistryActor  │────▶│ per-connection   │
//! └─────────────────┘     └─────────────────┘     │ outbound queues  │
//!         │                       │               └──────────────────┘
//!         │   RegistryCommand     │   RelayEvent
//!         │   (mpsc channel)      │   (broadcast)
//!         ▼                       ▼
//!  Add/Remove/SetName/    HashMap<ConnectionId,   Local observer
//!  Broadcast              Connection>             (server console)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod connection;
mod fanout;
mod handle;

pub use actor::RegistryActor;
pub use commands::{BroadcastReport, RegistryCommand, RegistryError, RelayEvent};
pub use connection::{Connection, ConnectionId, ConnectionInfo, Outbox};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// # Example
///
/// ```no_run
/// use xcomd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     let connections = handle.snapshot().await;
///     assert!(connections.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
