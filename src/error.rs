//! Error types for the radio session.
//!
//! Only transport failures are ever escalated to callers. Per-message
//! problems (a malformed status line, an undecodable datagram) are logged by
//! the loop that saw them and the loop moves on.

use thiserror::Error;

/// Session-level errors.
///
/// These are the conditions a caller of [`crate::Session`] can observe:
/// failing to reach the radio, losing the command transport, or a bad
/// configuration file.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Failed to reach the radio or bind the local streaming endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] std::io::Error),

    /// Read or write failure on either transport.
    #[error("Transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::AddrNotAvailable
            | std::io::ErrorKind::AddrInUse => SessionError::ConnectionFailed(err),
            _ => SessionError::Transport(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// A status message that cannot be applied as an object patch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("Malformed patch: no tokens found")]
    NoTokens,

    #[error("Malformed patch: not a key value list")]
    NotKeyValue,

    /// The positional identifier does not fit the registry's key type.
    #[error("Malformed patch: invalid object identifier {0:?}")]
    InvalidIdentifier(String),
}

/// Failure to decode a streaming datagram or one of its payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Buffer too short: {len} bytes, need at least {need}")]
    TooShort { len: usize, need: usize },

    #[error("Declared packet size {declared} bytes exceeds datagram length {len}")]
    Truncated { declared: usize, len: usize },

    #[error("Packet carries no class identifier")]
    MissingClassId,

    #[error("Payload length {len} is not a multiple of {unit}")]
    Misaligned { len: usize, unit: usize },
}
