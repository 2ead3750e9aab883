//! VITA-49 telemetry codec.
//!
//! - `preamble` - header, stream id, class id and timestamps
//! - `decode` - payload formats per class code
//!
//! [`VitaCodec`] is the seam the packet demultiplexer decodes through; the
//! provided methods implement the FlexRadio formats, so [`FlexVita`] needs
//! no overrides.

mod decode;
mod preamble;

pub use decode::{decode_fft, decode_if_data, decode_meter, decode_waterfall};
pub use preamble::{
    parse_preamble, ClassCode, ClassId, Header, Packet, PacketType, Preamble, FLEX_OUI,
    HEADER_SIZE,
};

#[cfg(test)]
pub(crate) use preamble::tests::build_datagram;

use crate::error::DecodeError;
use crate::models::{FftFrame, IfData, MeterPacket, WaterfallTile};

/// Parses datagrams and decodes payloads.
pub trait VitaCodec: Send + Sync {
    fn parse_preamble(&self, datagram: &[u8]) -> Packet {
        parse_preamble(datagram)
    }

    fn decode_fft(&self, payload: &[u8], preamble: &Preamble) -> Result<FftFrame, DecodeError> {
        decode_fft(payload, preamble)
    }

    fn decode_if_data(&self, payload: &[u8], preamble: &Preamble) -> Result<IfData, DecodeError> {
        decode_if_data(payload, preamble)
    }

    fn decode_meter(
        &self,
        payload: &[u8],
        preamble: &Preamble,
    ) -> Result<MeterPacket, DecodeError> {
        decode_meter(payload, preamble)
    }

    fn decode_waterfall(
        &self,
        payload: &[u8],
        preamble: &Preamble,
    ) -> Result<WaterfallTile, DecodeError> {
        decode_waterfall(payload, preamble)
    }
}

/// The FlexRadio codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlexVita;

impl VitaCodec for FlexVita {}
