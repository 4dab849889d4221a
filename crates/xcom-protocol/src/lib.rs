//! xcom Protocol - Line protocol shared by the relay and the client
//!
//! The wire format is plain UTF-8 text, one message per `\n`-terminated
//! line. This crate owns the pieces both sides agree on:
//! - `frame` - reading lines as explicit `LineRead` outcomes
//! - `message` - display names and the exact text of relay announcements

pub mod frame;
pub mod message;

pub use frame::{is_blank, line_reader, line_writer, read_line, FrameError, LineRead};
pub use message::{ChatLine, DisplayName, DEFAULT_DISPLAY_NAME, DEFAULT_PORT};
