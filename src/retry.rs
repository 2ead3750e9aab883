//! Read-failure backoff shared by both transport loops.

use std::time::Duration;

use crate::error::{Result, SessionError};

/// First retry delay; doubles on each consecutive failure.
const INITIAL_DELAY_MS: u64 = 100;

/// Upper bound on a single retry delay.
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Tracks consecutive read failures on one transport.
#[derive(Debug)]
pub struct Backoff {
    failures: u32,
    max_failures: u32,
}

impl Backoff {
    /// `max_failures` consecutive failures end the loop. Zero is treated as one.
    pub fn new(max_failures: u32) -> Self {
        Self {
            failures: 0,
            max_failures: max_failures.max(1),
        }
    }

    /// Call after a successful read.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay before the next retry: 100ms, 200ms, 400ms, ... capped at 5s.
    pub fn delay(&self) -> Duration {
        let exponent = self.failures.saturating_sub(1).min(16);
        Duration::from_millis(INITIAL_DELAY_MS << exponent).min(MAX_DELAY)
    }

    /// Record a failure and sleep, or give up with the error once the limit
    /// is reached.
    pub async fn fail(&mut self, err: std::io::Error) -> Result<()> {
        self.failures += 1;
        if self.failures >= self.max_failures {
            return Err(SessionError::Transport(err));
        }
        tokio::time::sleep(self.delay()).await;
        Ok(())
    }
}
