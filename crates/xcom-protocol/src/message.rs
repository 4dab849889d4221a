//! Display names and relay announcement text.

use std::fmt;

/// Name used when a peer's handshake line is blank.
pub const DEFAULT_DISPLAY_NAME: &str = "Unknown";

/// Port the relay listens on when none is given.
pub const DEFAULT_PORT: u16 = 12345;

/// A peer's display name, taken from its handshake line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Builds a display name from a raw handshake line.
    ///
    /// Surrounding whitespace is trimmed; a blank line yields
    /// [`DEFAULT_DISPLAY_NAME`].
    pub fn from_handshake(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Self(DEFAULT_DISPLAY_NAME.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A line the relay broadcasts to every connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    /// A peer finished its handshake.
    Joined { name: DisplayName },

    /// A peer sent a line of text.
    Text { name: DisplayName, text: String },

    /// A previously announced peer went away.
    Left,
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatLine::Joined { name } => write!(f, "{name} has joined the chat."),
            ChatLine::Text { name, text } => write!(f, "{name}: {text}"),
            ChatLine::Left => f.write_str("A user has left the chat."),
        }
    }
}
