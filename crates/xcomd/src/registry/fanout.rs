//! Fan-out of one line to a set of connections.
//!
//! Delivery is a non-blocking enqueue onto each recipient's outbound queue.
//! A full or closed queue only affects that recipient: the line is dropped
//! for it and counted, and the loop moves on. Membership is never touched
//! here; removal belongs to the connection's own reader task.

use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::commands::BroadcastReport;
use super::connection::Connection;

/// Enqueues `line` to every connection in `recipients`.
pub(crate) fn fan_out<'a, I>(recipients: I, line: &str) -> BroadcastReport
where
    I: IntoIterator<Item = &'a Connection>,
{
    let mut report = BroadcastReport::default();

    for connection in recipients {
        report.recipients += 1;

        match connection.outbox().try_send(line.to_string()) {
            Ok(()) => report.delivered += 1,
            Err(TrySendError::Full(_)) => {
                debug!(
                    connection = %connection.id(),
                    "Outbound queue full, dropping line"
                );
                report.dropped += 1;
            }
            Err(TrySendError::Closed(_)) => {
                debug!(
                    connection = %connection.id(),
                    "Writer stopped, dropping line"
                );
                report.dropped += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::connection::ConnectionId;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn connection(id: u64, capacity: usize) -> (Connection, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        (Connection::new(ConnectionId::new(id), addr, tx), rx)
    }

    #[test]
    fn test_fan_out_reaches_everyone() {
        let (a, mut rx_a) = connection(1, 4);
        let (b, mut rx_b) = connection(2, 4);

        let report = fan_out([&a, &b], "alice: hi");

        assert_eq!(report.recipients, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(rx_a.try_recv().unwrap(), "alice: hi");
        assert_eq!(rx_b.try_recv().unwrap(), "alice: hi");
    }

    #[test]
    fn test_full_queue_does_not_block_others() {
        let (slow, mut rx_slow) = connection(1, 1);
        let (fast, mut rx_fast) = connection(2, 8);

        fan_out([&slow, &fast], "one");
        let report = fan_out([&slow, &fast], "two");

        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(rx_slow.try_recv().unwrap(), "one");
        assert!(rx_slow.try_recv().is_err());
        assert_eq!(rx_fast.try_recv().unwrap(), "one");
        assert_eq!(rx_fast.try_recv().unwrap(), "two");
    }

    #[test]
    fn test_closed_queue_is_ignored() {
        let (gone, rx_gone) = connection(1, 4);
        let (alive, mut rx_alive) = connection(2, 4);
        drop(rx_gone);

        let report = fan_out([&gone, &alive], "still here");

        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(rx_alive.try_recv().unwrap(), "still here");
    }
}
