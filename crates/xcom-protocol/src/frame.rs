//! Newline-delimited framing.
//!
//! Every read from a peer resolves to a [`LineRead`]: a decoded line, a clean
//! end of stream, or a failure. Callers match on the outcome instead of
//! treating end-of-stream as an error.

use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Outcome of reading one line from a peer.
#[derive(Debug)]
pub enum LineRead {
    /// A complete line, without its `\n` (or `\r\n`) terminator.
    Line(String),

    /// The peer closed the stream cleanly.
    Closed,

    /// The stream failed or carried bytes that are not a valid line.
    Failed(FrameError),
}

/// Errors surfaced while decoding lines.
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("line exceeds the maximum length")]
    LineTooLong,
}

impl From<LinesCodecError> for FrameError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::Io(e) => FrameError::Io(e.to_string()),
            LinesCodecError::MaxLineLengthExceeded => FrameError::LineTooLong,
        }
    }
}

/// Wraps a byte source in an unbounded line decoder.
pub fn line_reader<R: AsyncRead>(reader: R) -> FramedRead<R, LinesCodec> {
    FramedRead::new(reader, LinesCodec::new())
}

/// Wraps a byte sink in a line encoder that appends `\n` to every item.
pub fn line_writer<W: AsyncWrite>(writer: W) -> FramedWrite<W, LinesCodec> {
    FramedWrite::new(writer, LinesCodec::new())
}

/// Reads the next line from a decoded line stream.
pub async fn read_line<S>(lines: &mut S) -> LineRead
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    match lines.next().await {
        Some(Ok(line)) => LineRead::Line(line),
        Some(Err(e)) => LineRead::Failed(e.into()),
        None => LineRead::Closed,
    }
}

/// Returns true for lines with no visible content.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
