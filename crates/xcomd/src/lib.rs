//! xcom relay - connection registry and broadcast server
//!
//! This crate provides the relay side of xcom:
//! - `registry` - Connection registry actor and broadcast fan-out
//! - `server` - TCP accept loop plus per-connection reader and writer tasks
//! - `config` - Server settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       xcom relay                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   RelayServer   │────▶│       RegistryActor         │   │
//! │  │  (TcpListener)  │     │   (connection state owner)  │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ per connection              │ lines / events    │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │ outbound queues → writers   │   │
//! │  │  (reader task)  │     │ broadcast::Sender<RelayEvent>│  │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod registry;
pub mod server;
