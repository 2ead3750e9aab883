//! Payload decoders for the FlexRadio telemetry classes.
//!
//! All multi-byte fields are big-endian. Decoders take the payload as split
//! off by the preamble parser and never look past its end.

use crate::error::DecodeError;
use crate::models::{
    FftFrame, IfData, IqSample, MeterPacket, MeterReading, WaterfallTile,
};
use crate::vita::preamble::Preamble;

/// FFT payload header: start bin, bin count, bin size, total bins, frame index.
const FFT_HEADER_SIZE: usize = 12;

/// Waterfall tile header size.
const WATERFALL_HEADER_SIZE: usize = 36;

/// Sequential big-endian reader over a payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        let bytes = self.buf.get(self.pos..end).ok_or(DecodeError::TooShort {
            len: self.buf.len(),
            need: end,
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        self.take().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.take().map(u32::from_be_bytes)
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        self.take().map(i64::from_be_bytes)
    }

    fn u16_vec(&mut self, count: usize) -> Result<Vec<u16>, DecodeError> {
        let need = self.pos + count * 2;
        if self.buf.len() < need {
            return Err(DecodeError::TooShort {
                len: self.buf.len(),
                need,
            });
        }
        (0..count).map(|_| self.u16()).collect()
    }
}

/// Decode an FFT frame segment.
pub fn decode_fft(payload: &[u8], preamble: &Preamble) -> Result<FftFrame, DecodeError> {
    let mut reader = Reader::new(payload);
    let start_bin_index = reader.u16()?;
    let num_bins = reader.u16()?;
    let bin_size = reader.u16()?;
    let total_bins_in_frame = reader.u16()?;
    let frame_index = reader.u32()?;
    debug_assert_eq!(reader.pos, FFT_HEADER_SIZE);
    let bins = reader.u16_vec(usize::from(num_bins))?;

    Ok(FftFrame {
        stream_id: preamble.stream_id,
        start_bin_index,
        num_bins,
        bin_size,
        total_bins_in_frame,
        frame_index,
        bins,
    })
}

/// Decode meter readings: repeated `(id: u16, value: i16)` pairs.
pub fn decode_meter(payload: &[u8], preamble: &Preamble) -> Result<MeterPacket, DecodeError> {
    if payload.len() % 4 != 0 {
        return Err(DecodeError::Misaligned {
            len: payload.len(),
            unit: 4,
        });
    }

    let readings = payload
        .chunks_exact(4)
        .map(|chunk| MeterReading {
            id: u16::from_be_bytes([chunk[0], chunk[1]]),
            value: i16::from_be_bytes([chunk[2], chunk[3]]),
        })
        .collect();

    Ok(MeterPacket {
        stream_id: preamble.stream_id,
        readings,
    })
}

/// Decode interleaved I/Q `f32` pairs.
pub fn decode_if_data(payload: &[u8], preamble: &Preamble) -> Result<IfData, DecodeError> {
    if payload.len() % 8 != 0 {
        return Err(DecodeError::Misaligned {
            len: payload.len(),
            unit: 8,
        });
    }

    let samples = payload
        .chunks_exact(8)
        .map(|chunk| IqSample {
            i: f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            q: f32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
        })
        .collect();

    Ok(IfData {
        stream_id: preamble.stream_id,
        class_code: preamble.class_id.packet_class_code.code(),
        samples,
    })
}

/// Decode a waterfall tile.
pub fn decode_waterfall(
    payload: &[u8],
    preamble: &Preamble,
) -> Result<WaterfallTile, DecodeError> {
    let mut reader = Reader::new(payload);
    let frame_low_freq = reader.i64()?;
    let bin_bandwidth = reader.i64()?;
    let line_duration_ms = reader.u32()?;
    let width = reader.u16()?;
    let height = reader.u16()?;
    let timecode = reader.u32()?;
    let auto_black_level = reader.u32()?;
    let total_bins_in_frame = reader.u16()?;
    let first_bin_index = reader.u16()?;
    debug_assert_eq!(reader.pos, WATERFALL_HEADER_SIZE);
    let data = reader.u16_vec(usize::from(width) * usize::from(height))?;

    Ok(WaterfallTile {
        stream_id: preamble.stream_id,
        frame_low_freq,
        bin_bandwidth,
        line_duration_ms,
        width,
        height,
        timecode,
        auto_black_level,
        total_bins_in_frame,
        first_bin_index,
        data,
    })
}
