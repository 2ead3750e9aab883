//! Output sinks.
//!
//! Every sink is an optional bounded channel. A sink is bound by calling the
//! matching `bind_*` method before the session starts, which returns the
//! receiving end. An unbound sink means nobody wants that telemetry kind:
//! its payloads are never decoded.
//!
//! A full channel applies backpressure to the loop that owns it. A closed
//! channel (receiver dropped) is treated as unbound from then on.

use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::models::{FftFrame, IfData, MeterPacket, WaterfallTile};
use crate::vita::Packet;

/// Sinks fed by the packet demultiplexer.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySinks {
    /// Every datagram as parsed, valid or not.
    pub packets: Option<Sender<Arc<Packet>>>,
    pub fft: Option<Sender<FftFrame>>,
    /// Opus frames, undecoded, trailer removed.
    pub audio: Option<Sender<Vec<u8>>>,
    /// IF narrow and all IF wide variants share this sink.
    pub if_data: Option<Sender<IfData>>,
    pub meter: Option<Sender<MeterPacket>>,
    pub waterfall: Option<Sender<WaterfallTile>>,
}

/// All sinks of one session.
#[derive(Debug, Clone, Default)]
pub struct Sinks {
    /// Raw response lines from the command transport.
    pub responses: Option<Sender<String>>,
    pub telemetry: TelemetrySinks,
}

fn bind<T>(slot: &mut Option<Sender<T>>, capacity: usize) -> Receiver<T> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    *slot = Some(tx);
    rx
}

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_responses(&mut self, capacity: usize) -> Receiver<String> {
        bind(&mut self.responses, capacity)
    }

    pub fn bind_packets(&mut self, capacity: usize) -> Receiver<Arc<Packet>> {
        bind(&mut self.telemetry.packets, capacity)
    }

    pub fn bind_fft(&mut self, capacity: usize) -> Receiver<FftFrame> {
        bind(&mut self.telemetry.fft, capacity)
    }

    pub fn bind_audio(&mut self, capacity: usize) -> Receiver<Vec<u8>> {
        bind(&mut self.telemetry.audio, capacity)
    }

    pub fn bind_if_data(&mut self, capacity: usize) -> Receiver<IfData> {
        bind(&mut self.telemetry.if_data, capacity)
    }

    pub fn bind_meter(&mut self, capacity: usize) -> Receiver<MeterPacket> {
        bind(&mut self.telemetry.meter, capacity)
    }

    pub fn bind_waterfall(&mut self, capacity: usize) -> Receiver<WaterfallTile> {
        bind(&mut self.telemetry.waterfall, capacity)
    }
}
