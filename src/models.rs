//! Data models for radio objects and streaming telemetry.
//!
//! Object models (`Panadapter`, `IqStream`) are reconstructed from status
//! patches and live in the session registries. Telemetry models are decoded
//! from VITA-49 payloads and handed to sinks.

use serde::Serialize;

/// A spectrum display object on the radio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Panadapter {
    /// Object identifier as reported by the radio (e.g. `0x40000000`).
    pub id: String,
    /// Center frequency in Hz (the radio reports MHz with six decimals).
    pub center: i64,
}

impl Panadapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// Center frequency in MHz, for display.
    pub fn center_mhz(&self) -> f64 {
        self.center as f64 / 1_000_000.0
    }
}

/// A DAX IQ sample stream endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IqStream {
    pub id: u32,
    /// Identifier of the panadapter feeding this stream.
    pub pan: String,
    /// Sample rate in samples per second.
    pub rate: u32,
}

impl IqStream {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// One FFT frame segment for a panadapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FftFrame {
    pub stream_id: u32,
    pub start_bin_index: u16,
    pub num_bins: u16,
    pub bin_size: u16,
    pub total_bins_in_frame: u16,
    pub frame_index: u32,
    /// Bin values in display pixel units.
    pub bins: Vec<u16>,
}

/// A single meter reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeterReading {
    /// Meter id, assigned dynamically by the radio.
    pub id: u16,
    /// Raw value in the meter's internal units.
    pub value: i16,
}

/// All meter readings carried by one datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeterPacket {
    /// Stream the meter set was sent on.
    pub stream_id: u32,
    pub readings: Vec<MeterReading>,
}

/// One complex baseband sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqSample {
    /// In-phase component.
    pub i: f32,
    /// Quadrature component.
    pub q: f32,
}

/// IF / DAX sample block from one datagram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfData {
    pub stream_id: u32,
    /// Packet class code, distinguishing narrow and wide bandwidth variants.
    pub class_code: u16,
    /// Interleaved I/Q pairs in arrival order.
    pub samples: Vec<IqSample>,
}

/// One waterfall tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaterfallTile {
    pub stream_id: u32,
    /// Frequency of the first bin, VITA-49 fixed point (20 fractional bits, Hz).
    pub frame_low_freq: i64,
    /// Width of one bin, same encoding as `frame_low_freq`.
    pub bin_bandwidth: i64,
    pub line_duration_ms: u32,
    /// Bins per row in this tile.
    pub width: u16,
    /// Rows in this tile.
    pub height: u16,
    /// Increments per waterfall line; tiles of one frame share it.
    pub timecode: u32,
    pub auto_black_level: u32,
    /// Bins across the whole frame, of which this tile carries `width`.
    pub total_bins_in_frame: u16,
    /// Index of this tile's first bin within the frame.
    pub first_bin_index: u16,
    /// `width * height` intensity values, row-major.
    pub data: Vec<u16>,
}
