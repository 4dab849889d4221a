//! Writer task: drains a connection's outbound queue onto its socket.
//!
//! The writer never closes the stream. A timed-out write leaves its
//! unsent bytes buffered and the next line flushes them first, so frames
//! stay whole. After an I/O error the task keeps the write half open and
//! discards queued lines until the connection leaves the registry. Only
//! the reader task ends a connection.

use std::time::Duration;

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

use xcom_protocol::line_writer;

use crate::registry::ConnectionId;

/// Spawns the writer task for one connection.
///
/// The task ends when every sender of `outbox_rx` has been dropped, which
/// happens once the connection left the registry.
pub fn spawn_writer<W>(
    connection_id: ConnectionId,
    writer: W,
    mut outbox_rx: mpsc::Receiver<String>,
    write_timeout: Duration,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut sink = line_writer(writer);

        while let Some(line) = outbox_rx.recv().await {
            match timeout(write_timeout, sink.send(line)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(
                        connection = %connection_id,
                        error = %e,
                        "Write failed, discarding output"
                    );
                    let mut discarded = 0usize;
                    while outbox_rx.recv().await.is_some() {
                        discarded += 1;
                    }
                    debug!(connection = %connection_id, discarded, "Outbox closed");
                    break;
                }
                Err(_) => {
                    debug!(connection = %connection_id, "Write timed out");
                }
            }
        }

        debug!(connection = %connection_id, "Writer task finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_writes_lines_in_order_then_stops() {
        let (mut client, server) = duplex(1024);
        let (tx, rx) = mpsc::channel(8);

        let task = spawn_writer(ConnectionId::new(1), server, rx, Duration::from_secs(1));
        tx.send("alice has joined the chat.".to_string()).await.unwrap();
        tx.send("alice: hi".to_string()).await.unwrap();
        drop(tx);

        task.await.unwrap();

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "alice has joined the chat.\nalice: hi\n");
    }

    #[tokio::test]
    async fn test_stalled_peer_keeps_stream_open() {
        // A 16-byte pipe nobody reads from fills up immediately
        let (mut client, server) = duplex(16);
        let (tx, rx) = mpsc::channel(8);

        let task = spawn_writer(ConnectionId::new(1), server, rx, Duration::from_millis(200));
        let first = "x".repeat(64);
        tx.send(first.clone()).await.unwrap();

        sleep(Duration::from_millis(500)).await;
        assert!(!task.is_finished());
        assert!(!tx.is_closed());

        // Once the peer reads again, the next line flushes the backlog first
        tx.send("alice: hi".to_string()).await.unwrap();
        let expected = format!("{first}\nalice: hi\n");
        let mut received = vec![0u8; expected.len()];
        timeout(Duration::from_secs(2), client.read_exact(&mut received))
            .await
            .expect("backlog should flush")
            .unwrap();
        assert_eq!(String::from_utf8(received).unwrap(), expected);

        drop(tx);
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_drains_until_outbox_closes() {
        let (client, server) = duplex(16);
        drop(client);
        let (tx, rx) = mpsc::channel(8);

        let task = spawn_writer(ConnectionId::new(1), server, rx, Duration::from_secs(1));
        tx.send("alice: hi".to_string()).await.unwrap();
        tx.send("alice: again".to_string()).await.unwrap();

        sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());
        assert!(!tx.is_closed());

        drop(tx);
        timeout(Duration::from_secs(2), task)
            .await
            .expect("writer should stop once the outbox closes")
            .unwrap();
    }
}
