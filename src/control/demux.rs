//! Response demultiplexer for the command transport.
//!
//! The first line the radio sends (after its version banner) assigns this
//! client's handle:
//!
//! ```text
//! H1234ABCD
//! ```
//!
//! Everything after that is a response record, forwarded verbatim to the
//! raw response sink and inspected for object status updates:
//!
//! ```text
//! R12|0|                                        reply to command 12
//! S1234ABCD|display pan 0x40000000 center=14.1  status update
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::Sender;

use crate::control::framing::LineAssembler;
use crate::error::Result;
use crate::retry::Backoff;
use crate::session::SessionState;

/// Where the demultiplexer is in the session handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxState {
    AwaitingHandle,
    Active,
}

/// A response line split at its `|` delimiter.
///
/// Lines that do not split into exactly two parts produce an empty prefix
/// and message; they are still forwarded raw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseRecord {
    pub prefix: String,
    pub message: String,
}

impl ResponseRecord {
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split('|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(message), None) => Self {
                prefix: prefix.to_string(),
                message: message.to_string(),
            },
            _ => Self::default(),
        }
    }
}

/// Routes lines from the command transport.
pub struct ResponseDemux {
    state: DemuxState,
    assembler: LineAssembler,
    shared: Arc<SessionState>,
    responses: Option<Sender<String>>,
    debug: bool,
}

impl ResponseDemux {
    pub fn new(shared: Arc<SessionState>, responses: Option<Sender<String>>, debug: bool) -> Self {
        Self {
            state: DemuxState::AwaitingHandle,
            assembler: LineAssembler::new(),
            shared,
            responses,
            debug,
        }
    }

    pub fn state(&self) -> DemuxState {
        self.state
    }

    /// Feed the bytes of one read.
    pub async fn feed(&mut self, bytes: &[u8]) {
        for line in self.assembler.push(bytes) {
            self.route_line(&line).await;
        }
    }

    /// Route one complete line.
    pub async fn route_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        // Only the first handle line counts; later ones are ordinary records.
        if self.state == DemuxState::AwaitingHandle && line.starts_with(['H', 'h']) {
            let handle = &line[1..];
            if self.shared.assign_handle(handle) {
                tracing::info!("Radio assigned handle {}", handle);
            }
            self.state = DemuxState::Active;
            return;
        }

        self.forward(line).await;

        // Status updates ride in the message part of the record.
        let record = ResponseRecord::parse(line);
        self.shared.apply_status(&record.message);
    }

    async fn forward(&mut self, line: &str) {
        let delivered = match &self.responses {
            Some(tx) => Some(tx.send(line.to_string()).await.is_ok()),
            None => None,
        };

        match delivered {
            Some(true) => {}
            Some(false) => {
                tracing::debug!("Response sink closed; unbinding");
                self.responses = None;
            }
            None => tracing::debug!("Response sink not bound: {}", line),
        }

        if self.debug {
            tracing::debug!("RESP: {}", line);
        }
    }

    /// Read the command transport until it closes.
    ///
    /// Read errors are retried with backoff; after `max_retries`
    /// consecutive failures the error is returned.
    pub async fn run<R: AsyncRead + Unpin>(
        mut self,
        mut reader: R,
        buffer_size: usize,
        max_retries: u32,
    ) -> Result<()> {
        let mut buf = vec![0u8; buffer_size.max(1)];
        let mut backoff = Backoff::new(max_retries);

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    if self.assembler.pending() > 0 {
                        tracing::warn!(
                            "Command transport closed with {} unterminated bytes",
                            self.assembler.pending()
                        );
                    }
                    tracing::info!("Command transport closed");
                    return Ok(());
                }
                Ok(n) => {
                    backoff.reset();
                    self.feed(&buf[..n]).await;
                }
                Err(e) => {
                    tracing::warn!(
                        failures = backoff.failures() + 1,
                        "Command transport read failed: {}",
                        e
                    );
                    if let Err(e) = backoff.fail(e).await {
                        tracing::error!("Giving up on the command transport: {}", e);
                        return Err(e);
                    }
                }
            }
        }
    }
}
