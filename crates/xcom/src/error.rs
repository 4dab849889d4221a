//! Error types for the xcom client.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use thiserror::Error;
use xcom_protocol::FrameError;

/// Client errors.
///
/// A relay that goes away mid-session is not an error: the reader task
/// reports it as `ClientEvent::Disconnected`.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not resolve or connect to the relay.
    #[error("Failed to connect to {addr}: {error}")]
    Connect { addr: String, error: String },

    /// Writing the handshake to the relay failed.
    #[error("Failed to send handshake: {0}")]
    Handshake(String),

    /// Local input could not be decoded as lines.
    #[error("Failed to read local input: {0}")]
    Input(#[from] FrameError),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
