//! Packet demultiplexer for the streaming transport.
//!
//! Each datagram is parsed once, handed to the raw packet sink, then routed
//! by `(packet type, class code)`:
//!
//! | packet type         | class code            | route     |
//! |---------------------|-----------------------|-----------|
//! | ExtDataWithStream   | FFT                   | fft       |
//! | ExtDataWithStream   | Opus                  | audio     |
//! | ExtDataWithStream   | IF narrow             | if_data   |
//! | ExtDataWithStream   | Meter                 | meter     |
//! | ExtDataWithStream   | Waterfall             | waterfall |
//! | ExtDataWithStream   | Discovery             | dropped   |
//! | IFDataWithStream    | IF wide 24/48/96/192  | if_data   |
//! | anything else       |                       | dropped   |
//!
//! A payload is only decoded when its sink is bound.

use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::ReadBuf;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::Sender;

use crate::error::{DecodeError, Result};
use crate::retry::Backoff;
use crate::sinks::TelemetrySinks;
use crate::vita::{ClassCode, FlexVita, Packet, PacketType, VitaCodec};

/// Destination of a routed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Fft,
    Audio,
    IfData,
    Meter,
    Waterfall,
    Discovery,
    Ignore,
}

pub fn route(packet_type: PacketType, class_code: ClassCode) -> Route {
    use ClassCode::*;
    use PacketType::*;

    match (packet_type, class_code) {
        (ExtDataWithStream, Fft) => Route::Fft,
        (ExtDataWithStream, Opus) => Route::Audio,
        (ExtDataWithStream, IfNarrow) => Route::IfData,
        (ExtDataWithStream, Meter) => Route::Meter,
        (ExtDataWithStream, Waterfall) => Route::Waterfall,
        (ExtDataWithStream, Discovery) => Route::Discovery,
        (IfDataWithStream, IfWide24 | IfWide48 | IfWide96 | IfWide192) => Route::IfData,
        _ => Route::Ignore,
    }
}

/// Where the packet loop receives datagrams from.
pub trait DatagramSource: Send + Sync {
    /// Receive one datagram into `buf`.
    fn poll_recv(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl DatagramSource for UdpSocket {
    fn poll_recv(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        UdpSocket::poll_recv(self, cx, buf)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// Send into a sink, unbinding it if the receiver is gone.
async fn publish<T>(slot: &mut Option<Sender<T>>, value: T, kind: &str) {
    let Some(tx) = slot.as_ref() else {
        return;
    };
    if tx.send(value).await.is_err() {
        tracing::debug!("{} sink closed; unbinding", kind);
        *slot = None;
    }
}

/// Decode and publish, skipping the decoder when the sink is unbound.
async fn decode_into<T>(
    slot: &mut Option<Sender<T>>,
    kind: &str,
    decode: impl FnOnce() -> std::result::Result<T, DecodeError>,
) {
    if slot.is_none() {
        return;
    }
    match decode() {
        Ok(record) => publish(slot, record, kind).await,
        Err(e) => tracing::warn!("Dropping {} packet: {}", kind, e),
    }
}

pub struct PacketDemux<C: VitaCodec = FlexVita> {
    codec: C,
    sinks: TelemetrySinks,
}

impl PacketDemux<FlexVita> {
    pub fn new(sinks: TelemetrySinks) -> Self {
        Self::with_codec(FlexVita, sinks)
    }
}

impl<C: VitaCodec> PacketDemux<C> {
    pub fn with_codec(codec: C, sinks: TelemetrySinks) -> Self {
        Self { codec, sinks }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Parse one datagram and deliver it.
    pub async fn handle_datagram(&mut self, datagram: &[u8]) {
        let packet = Arc::new(self.codec.parse_preamble(datagram));

        if let Some(e) = &packet.error {
            tracing::debug!("Unparseable datagram ({} bytes): {}", datagram.len(), e);
        }
        // Every datagram reaches the raw sink, valid or not.
        publish(&mut self.sinks.packets, Arc::clone(&packet), "packet").await;

        self.dispatch(&packet).await;
    }

    /// Route a parsed packet to its typed sink.
    pub async fn dispatch(&mut self, packet: &Packet) {
        if !packet.is_valid() {
            return;
        }

        let preamble = &packet.preamble;
        let payload = packet.trimmed_payload();
        let codec = &self.codec;

        match route(preamble.header.packet_type, preamble.class_id.packet_class_code) {
            Route::Fft => {
                decode_into(&mut self.sinks.fft, "FFT", || codec.decode_fft(payload, preamble))
                    .await
            }
            Route::Audio => {
                decode_into(&mut self.sinks.audio, "audio", || Ok(payload.to_vec())).await
            }
            Route::IfData => {
                decode_into(&mut self.sinks.if_data, "IF data", || {
                    codec.decode_if_data(payload, preamble)
                })
                .await
            }
            Route::Meter => {
                decode_into(&mut self.sinks.meter, "meter", || {
                    codec.decode_meter(payload, preamble)
                })
                .await
            }
            Route::Waterfall => {
                decode_into(&mut self.sinks.waterfall, "waterfall", || {
                    codec.decode_waterfall(payload, preamble)
                })
                .await
            }
            Route::Discovery => tracing::trace!("Ignoring discovery packet"),
            Route::Ignore => tracing::trace!(
                packet_type = ?preamble.header.packet_type,
                class_code = preamble.class_id.packet_class_code.code(),
                "Ignoring packet"
            ),
        }
    }

    /// Receive datagrams until the task is aborted.
    ///
    /// Receive errors are retried with backoff; after `max_retries`
    /// consecutive failures the error is returned.
    pub async fn run<S: DatagramSource>(
        mut self,
        source: S,
        buffer_size: usize,
        max_retries: u32,
    ) -> Result<()> {
        let mut buf = vec![0u8; buffer_size.max(1)];
        let mut backoff = Backoff::new(max_retries);

        loop {
            let mut read_buf = ReadBuf::new(&mut buf[..]);
            let received = poll_fn(|cx| source.poll_recv(cx, &mut read_buf)).await;

            match received {
                Ok(()) => {
                    backoff.reset();
                    self.handle_datagram(read_buf.filled()).await;
                }
                Err(e) => {
                    tracing::warn!(
                        failures = backoff.failures() + 1,
                        "Streaming transport receive failed: {}",
                        e
                    );
                    if let Err(e) = backoff.fail(e).await {
                        tracing::error!("Giving up on the streaming transport: {}", e);
                        return Err(e);
                    }
                }
            }
        }
    }
}
