//! radiolink - client session engine for FlexRadio SmartSDR radios.
//!
//! A session talks to the radio over two transports at once:
//!
//! - `control` - the TCP command transport: sequenced commands out, handle
//!   assignment and status lines in
//! - `stream` - the UDP streaming transport: VITA-49 telemetry routed to
//!   typed sinks
//!
//! Status lines are parsed by `patch` into key/value updates and merged
//! into the object registries in `registry`. `session` ties the pieces
//! together.
//!
//! ```ignore
//! use radiolink::{Session, SessionConfig, Sinks};
//!
//! let config = SessionConfig::load()?;
//! let mut sinks = Sinks::new();
//! let mut fft = sinks.bind_fft(config.sink_capacity);
//! let session = Session::connect(&config, sinks).await?;
//! session.subscribe(&config.subscriptions).await?;
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod models;
pub mod patch;
pub mod registry;
pub mod retry;
pub mod session;
pub mod sinks;
pub mod stream;
pub mod vita;

pub use config::SessionConfig;
pub use error::{DecodeError, PatchError, Result, SessionError};
pub use session::{Session, SessionState};
pub use sinks::Sinks;
