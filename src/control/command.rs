//! Command sequencing and transmission.
//!
//! Every command sent to the radio carries a sequence number that the radio
//! echoes in its reply:
//!
//! ```text
//! C<seq>|<command>\r
//! ```
//!
//! Sequence numbers start at 1 and increase by exactly one per command.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{Result, SessionError};

/// Build the wire frame for one command.
pub fn frame(sequence: u64, command: &str) -> String {
    format!("C{}|{}\r", sequence, command)
}

/// Issues command sequence numbers.
///
/// Safe to share between tasks; each call to [`Sequencer::issue`] gets a
/// distinct number.
#[derive(Debug, Default)]
pub struct Sequencer {
    last: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next sequence number and build its wire frame.
    pub fn issue(&self, command: &str) -> (String, u64) {
        let sequence = self.last.fetch_add(1, Ordering::SeqCst) + 1;
        (frame(sequence, command), sequence)
    }

    /// Most recently issued sequence number, 0 if none.
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Writer side of the command transport.
///
/// The sequence number is taken while holding the writer, so frames reach
/// the wire in sequence order even with concurrent senders.
#[derive(Debug)]
pub struct CommandChannel<W> {
    writer: Mutex<W>,
    sequencer: Sequencer,
}

impl<W: AsyncWrite + Unpin> CommandChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            sequencer: Sequencer::new(),
        }
    }

    /// Send one command and return its sequence number.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transport` if the write fails. The session
    /// should be considered lost at that point.
    pub async fn send(&self, command: &str) -> Result<u64> {
        // Issue under the lock so sequence order is wire order.
        let mut writer = self.writer.lock().await;
        let (wire, sequence) = self.sequencer.issue(command);

        writer
            .write_all(wire.as_bytes())
            .await
            .map_err(SessionError::Transport)?;
        writer.flush().await.map_err(SessionError::Transport)?;

        tracing::debug!(sequence, "Sent command: {}", command);
        Ok(sequence)
    }

    pub fn last_issued(&self) -> u64 {
        self.sequencer.last_issued()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_frame_format() {
        assert_eq!(frame(1, "sub pan all"), "C1|sub pan all\r");
        assert_eq!(frame(42, "ping"), "C42|ping\r");
    }

    #[test]
    fn test_sequence_starts_at_one_and_increments() {
        let sequencer = Sequencer::new();
        assert_eq!(sequencer.last_issued(), 0);

        for expected in 1..=5u64 {
            let (wire, sequence) = sequencer.issue("info");
            assert_eq!(sequence, expected);
            assert_eq!(wire, format!("C{}|info\r", expected));
        }
        assert_eq!(sequencer.last_issued(), 5);
    }

    #[test]
    fn test_concurrent_issue_is_unique() {
        let sequencer = Arc::new(Sequencer::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequencer = Arc::clone(&sequencer);
                std::thread::spawn(move || {
                    (0..250).map(|_| sequencer.issue("x").1).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for sequence in handle.join().unwrap() {
                assert!(seen.insert(sequence), "duplicate sequence {}", sequence);
            }
        }
        assert_eq!(seen.len(), 2000);
        assert_eq!(seen.iter().max(), Some(&2000));
    }

    #[tokio::test]
    async fn test_send_writes_frames_in_order() {
        let (client, mut server) = tokio::io::duplex(1024);
        let channel = CommandChannel::new(client);

        assert_eq!(channel.send("sub tx all").await.unwrap(), 1);
        assert_eq!(channel.send("sub pan all").await.unwrap(), 2);
        drop(channel);

        let mut received = String::new();
        timeout(TEST_TIMEOUT, server.read_to_string(&mut received))
            .await
            .expect("Test timed out")
            .expect("Read failed");

        assert_eq!(received, "C1|sub tx all\rC2|sub pan all\r");
    }

    #[tokio::test]
    async fn test_send_fails_when_peer_gone() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);

        let channel = CommandChannel::new(client);
        let result = channel.send("sub tx all").await;
        assert!(matches!(result, Err(SessionError::Transport(_))));
    }
}
