//! xcom client - duplexes local input with a chat relay
//!
//! The client runs two flows against one TCP connection:
//!
//! 1. **Relay reader task**: reads broadcast lines and forwards them as
//!    `ClientEvent`s to the console
//! 2. **Input writer (main flow)**: sends the handshake name, then every
//!    non-blank local input line, until local input ends
//!
//! The two flows share nothing but the socket, split into independent read
//! and write halves.

pub mod client;
pub mod error;

pub use client::{ChatClient, ClientConfig, ClientEvent};
pub use error::{ClientError, Result};
