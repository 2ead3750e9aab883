//! VITA-49 packet preamble.
//!
//! FlexRadio streams always carry a stream id, a class id and both
//! timestamps, giving a fixed 28-byte header (all fields big-endian):
//!
//! ```text
//! offset  field
//!  0- 3   header word: type(31-28) C(27) T(26) TSI(23-22) TSF(21-20)
//!         count(19-16) size in 32-bit words(15-0)
//!  4- 7   stream id
//!  8-11   OUI (low 24 bits)
//! 12-13   information class code
//! 14-15   packet class code
//! 16-19   integer timestamp
//! 20-27   fractional timestamp
//! ```

use chrono::{DateTime, Utc};

use crate::error::DecodeError;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 28;

/// FlexRadio OUI.
pub const FLEX_OUI: u32 = 0x001C2D;

/// Trailer length when the T bit is set.
const TRAILER_SIZE: usize = 4;

/// VITA-49 packet type (bits 31-28 of the header word).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PacketType {
    /// No header could be decoded.
    #[default]
    Unparsed,
    IfDataWithStream,
    ExtDataWithStream,
    Other(u8),
}

impl PacketType {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0x1 => PacketType::IfDataWithStream,
            0x3 => PacketType::ExtDataWithStream,
            other => PacketType::Other(other),
        }
    }
}

/// Packet class code, selecting the payload format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClassCode {
    Meter,
    Fft,
    Waterfall,
    Opus,
    /// DAX audio, 24 ksps.
    IfNarrow,
    IfWide24,
    IfWide48,
    IfWide96,
    IfWide192,
    Discovery,
    #[default]
    Unknown,
    Other(u16),
}

impl ClassCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            0x8002 => ClassCode::Meter,
            0x8003 => ClassCode::Fft,
            0x8004 => ClassCode::Waterfall,
            0x8005 => ClassCode::Opus,
            0x03E3 => ClassCode::IfNarrow,
            0x02E3 => ClassCode::IfWide24,
            0x02E4 => ClassCode::IfWide48,
            0x02E5 => ClassCode::IfWide96,
            0x02E6 => ClassCode::IfWide192,
            0xFFFF => ClassCode::Discovery,
            other => ClassCode::Other(other),
        }
    }

    /// Wire value, or 0 for `Unknown`.
    pub fn code(&self) -> u16 {
        match self {
            ClassCode::Meter => 0x8002,
            ClassCode::Fft => 0x8003,
            ClassCode::Waterfall => 0x8004,
            ClassCode::Opus => 0x8005,
            ClassCode::IfNarrow => 0x03E3,
            ClassCode::IfWide24 => 0x02E3,
            ClassCode::IfWide48 => 0x02E4,
            ClassCode::IfWide96 => 0x02E5,
            ClassCode::IfWide192 => 0x02E6,
            ClassCode::Discovery => 0xFFFF,
            ClassCode::Unknown => 0,
            ClassCode::Other(code) => *code,
        }
    }
}

/// Decoded header word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub packet_type: PacketType,
    /// C bit: a class identifier follows the stream id.
    pub class_id_present: bool,
    /// T bit: the packet ends with a 32-bit trailer.
    pub trailer_present: bool,
    /// Integer timestamp type (0 none, 1 UTC, 2 GPS, 3 other).
    pub tsi: u8,
    /// Fractional timestamp type (0 none, 1 samples, 2 picoseconds, 3 free running).
    pub tsf: u8,
    /// Modulo-16 packet counter per stream.
    pub packet_count: u8,
    /// Total packet size in 32-bit words, header included.
    pub packet_size_words: u16,
    /// Bytes at the end of the payload that are not payload data.
    pub payload_cutoff_bytes: usize,
}

/// Class identifier: who defined the packet and what it carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassId {
    /// Organizationally unique identifier, 24 bits.
    pub oui: u32,
    /// Vendor information class; identifies the radio family.
    pub information_class_code: u16,
    /// Selects the payload format.
    pub packet_class_code: ClassCode,
}

/// Everything before the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preamble {
    pub header: Header,
    /// Identifies the radio object (panadapter, meter set, DAX stream) the
    /// packet belongs to.
    pub stream_id: u32,
    pub class_id: ClassId,
    /// Seconds, in the clock selected by `header.tsi`.
    pub timestamp_int: u32,
    /// Sub-second part, in the units selected by `header.tsf`.
    pub timestamp_frac: u64,
}

/// One received datagram: preamble, payload and any parse failure.
///
/// A packet with `error` set still carries whatever could be decoded; it is
/// forwarded to the raw packet sink but never dispatched.
#[derive(Debug, Clone)]
pub struct Packet {
    pub preamble: Preamble,
    pub payload: Vec<u8>,
    pub error: Option<DecodeError>,
    pub received_at: DateTime<Utc>,
}

impl Packet {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Payload without the trailing cutoff bytes.
    pub fn trimmed_payload(&self) -> &[u8] {
        let keep = self
            .payload
            .len()
            .saturating_sub(self.preamble.header.payload_cutoff_bytes);
        &self.payload[..keep]
    }

    fn failed(preamble: Preamble, payload: &[u8], error: DecodeError) -> Self {
        Self {
            preamble,
            payload: payload.to_vec(),
            error: Some(error),
            received_at: Utc::now(),
        }
    }
}

fn be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Split a datagram into preamble and payload.
///
/// Never fails outright: problems are reported in [`Packet::error`].
pub fn parse_preamble(datagram: &[u8]) -> Packet {
    if datagram.len() < 4 {
        return Packet::failed(
            Preamble::default(),
            datagram,
            DecodeError::TooShort {
                len: datagram.len(),
                need: HEADER_SIZE,
            },
        );
    }

    // The header word is readable even when the rest is missing.
    let word = be_u32(datagram, 0);
    let trailer_present = (word >> 26) & 1 == 1;
    let header = Header {
        packet_type: PacketType::from_bits(((word >> 28) & 0x0F) as u8),
        class_id_present: (word >> 27) & 1 == 1,
        trailer_present,
        tsi: ((word >> 22) & 0x03) as u8,
        tsf: ((word >> 20) & 0x03) as u8,
        packet_count: ((word >> 16) & 0x0F) as u8,
        packet_size_words: (word & 0xFFFF) as u16,
        payload_cutoff_bytes: if trailer_present { TRAILER_SIZE } else { 0 },
    };
    let mut preamble = Preamble {
        header,
        ..Default::default()
    };

    if datagram.len() < HEADER_SIZE {
        return Packet::failed(
            preamble,
            &datagram[4..],
            DecodeError::TooShort {
                len: datagram.len(),
                need: HEADER_SIZE,
            },
        );
    }

    // Stream id and timestamps are always present in Flex packets.
    preamble.stream_id = be_u32(datagram, 4);
    preamble.timestamp_int = be_u32(datagram, 16);
    preamble.timestamp_frac =
        (u64::from(be_u32(datagram, 20)) << 32) | u64::from(be_u32(datagram, 24));

    if !header.class_id_present {
        return Packet::failed(preamble, &datagram[HEADER_SIZE..], DecodeError::MissingClassId);
    }

    preamble.class_id = ClassId {
        oui: be_u32(datagram, 8) & 0x00FF_FFFF,
        information_class_code: be_u16(datagram, 12),
        packet_class_code: ClassCode::from_code(be_u16(datagram, 14)),
    };
    if preamble.class_id.oui != FLEX_OUI {
        tracing::trace!(oui = preamble.class_id.oui, "Packet OUI is not FlexRadio");
    }

    // Bound the payload by the declared size; padding past it is ignored.
    let declared = usize::from(header.packet_size_words) * 4;
    if declared > datagram.len() {
        return Packet::failed(
            preamble,
            &datagram[HEADER_SIZE..],
            DecodeError::Truncated {
                declared,
                len: datagram.len(),
            },
        );
    }
    // A size smaller than the header is taken as "whole datagram".
    let end = if declared >= HEADER_SIZE { declared } else { datagram.len() };

    Packet {
        preamble,
        payload: datagram[HEADER_SIZE..end].to_vec(),
        error: None,
        received_at: Utc::now(),
    }
}
