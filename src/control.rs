//! Command/response transport.
//!
//! The radio's command channel is a TCP connection carrying text lines:
//!
//! ```text
//! ┌─────────────┐   C<seq>|<command>\r          ┌─────────┐
//! │  Session    │ ─────────────────────────────►│  Radio  │
//! │             │ ◄───────────────────────────── │         │
//! └─────────────┘   H<handle>, <prefix>|<msg>\n  └─────────┘
//! ```
//!
//! - `command` - sequence numbering and transmission
//! - `framing` - line reassembly across reads
//! - `demux` - handle capture and response routing

mod command;
mod demux;
mod framing;

pub use command::{frame, CommandChannel, Sequencer};
pub use demux::{DemuxState, ResponseDemux, ResponseRecord};
pub use framing::LineAssembler;
