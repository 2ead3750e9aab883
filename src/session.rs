//! A live session with one radio.
//!
//! A session owns both transports. Connecting spawns two tasks:
//!
//! - the response loop reads the TCP command transport, captures the session
//!   handle and applies status patches to the object registries
//! - the packet loop reads the UDP streaming transport and feeds the sinks
//!
//! Commands are sent from the caller's task through [`Session::send_command`].
//!
//! # Example
//!
//! ```ignore
//! let config = SessionConfig::load()?;
//! let mut sinks = Sinks::new();
//! let mut meters = sinks.bind_meter(config.sink_capacity);
//!
//! let session = Session::connect(&config, sinks).await?;
//! session.subscribe(&config.subscriptions).await?;
//! while let Some(packet) = meters.recv().await {
//!     println!("{:?}", packet.readings);
//! }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::control::{CommandChannel, ResponseDemux};
use crate::error::{Result, SessionError};
use crate::models::{IqStream, Panadapter};
use crate::patch::{self, PatchTarget, OBJECT_SKIP_COUNT};
use crate::registry::Registry;
use crate::sinks::Sinks;
use crate::stream::{DatagramSource, PacketDemux};
use crate::vita::{FlexVita, VitaCodec};

/// Public address used to find the local interface of the default route.
/// Nothing is sent to it.
const ROUTE_TARGET_ADDR: &str = "8.8.8.8:80";

/// State shared between the session and its response loop.
#[derive(Debug, Default)]
pub struct SessionState {
    handle: OnceLock<String>,
    pub panadapters: Registry<Panadapter>,
    pub iq_streams: Registry<IqStream>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle assigned by the radio, once it has been received.
    pub fn handle(&self) -> Option<&str> {
        self.handle.get().map(String::as_str)
    }

    /// Record the session handle. Only the first call has any effect.
    pub fn assign_handle(&self, handle: &str) -> bool {
        self.handle.set(handle.to_string()).is_ok()
    }

    /// Apply a status message to the matching registry.
    ///
    /// Messages that are not object status, or that fail to parse, leave
    /// the registries untouched.
    pub fn apply_status(&self, message: &str) {
        let Some(target) = patch::classify(message) else {
            return;
        };

        let result = patch::parse(message, OBJECT_SKIP_COUNT).and_then(|patch| match target {
            PatchTarget::Panadapter => self.panadapters.apply_patch(&patch),
            PatchTarget::IqStream => self.iq_streams.apply_patch(&patch),
        });

        match result {
            Ok(true) => tracing::trace!(?target, "Applied status: {}", message),
            Ok(false) => {}
            Err(e) => tracing::debug!("Skipping status {:?}: {}", message, e),
        }
    }
}

/// Find the local address of the interface that routes to the internet.
pub async fn discover_local_ip() -> Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(SessionError::ConnectionFailed)?;
    socket
        .connect(ROUTE_TARGET_ADDR)
        .await
        .map_err(SessionError::ConnectionFailed)?;
    Ok(socket.local_addr()?.ip())
}

/// A connected radio session.
///
/// Dropping the session aborts both loops.
pub struct Session {
    commands: CommandChannel<OwnedWriteHalf>,
    state: Arc<SessionState>,
    udp_endpoint: SocketAddr,
    responses: JoinHandle<Result<()>>,
    packets: JoinHandle<Result<()>>,
}

impl Session {
    /// Connect to the radio named in `config` and start both loops.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ConnectionFailed` if the radio cannot be
    /// reached, the local address cannot be discovered, or the streaming
    /// socket cannot be bound.
    pub async fn connect(config: &SessionConfig, sinks: Sinks) -> Result<Self> {
        let addr = config.command_addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(SessionError::ConnectionFailed)?;
        tracing::info!("Connected to radio at {}", addr);

        // The radio streams to whatever address we bind, so pick the
        // interface facing it unless one is configured.
        let local_ip = match config.local_ip {
            Some(ip) => ip,
            None => discover_local_ip().await?,
        };
        let socket = UdpSocket::bind(SocketAddr::new(local_ip, config.udp_port))
            .await
            .map_err(SessionError::ConnectionFailed)?;

        Self::start(stream, socket, config, sinks)
    }

    /// Start a session over already established transports.
    pub fn start(
        stream: TcpStream,
        socket: UdpSocket,
        config: &SessionConfig,
        sinks: Sinks,
    ) -> Result<Self> {
        Self::start_with_codec(stream, socket, config, sinks, FlexVita)
    }

    /// Start a session receiving telemetry from `source` and decoding it
    /// with `codec`.
    pub fn start_with_codec<S, C>(
        stream: TcpStream,
        source: S,
        config: &SessionConfig,
        sinks: Sinks,
        codec: C,
    ) -> Result<Self>
    where
        S: DatagramSource + 'static,
        C: VitaCodec + 'static,
    {
        let udp_endpoint = source.local_addr()?;
        tracing::info!("Listening for telemetry on {}", udp_endpoint);

        let state = Arc::new(SessionState::new());
        let (reader, writer) = stream.into_split();

        let demux = ResponseDemux::new(Arc::clone(&state), sinks.responses, config.debug);
        // Each loop owns its transport; only the state is shared.
        let responses = tokio::spawn(demux.run(
            reader,
            config.read_buffer_size,
            config.max_read_retries,
        ));

        let packet_demux = PacketDemux::with_codec(codec, sinks.telemetry);
        let packets = tokio::spawn(packet_demux.run(
            source,
            config.datagram_buffer_size,
            config.max_read_retries,
        ));

        Ok(Self {
            commands: CommandChannel::new(writer),
            state,
            udp_endpoint,
            responses,
            packets,
        })
    }

    /// Send one command and return its sequence number.
    pub async fn send_command(&self, command: &str) -> Result<u64> {
        self.commands.send(command).await
    }

    /// Send each subscription command in order.
    pub async fn subscribe(&self, subscriptions: &[String]) -> Result<Vec<u64>> {
        let mut sequences = Vec::with_capacity(subscriptions.len());
        for sub in subscriptions {
            sequences.push(self.send_command(sub).await?);
        }
        tracing::info!("Sent {} subscriptions", sequences.len());
        Ok(sequences)
    }

    pub fn handle(&self) -> Option<&str> {
        self.state.handle()
    }

    pub fn panadapters(&self) -> &Registry<Panadapter> {
        &self.state.panadapters
    }

    pub fn iq_streams(&self) -> &Registry<IqStream> {
        &self.state.iq_streams
    }

    /// Local address of the streaming socket.
    pub fn udp_endpoint(&self) -> SocketAddr {
        self.udp_endpoint
    }

    /// Whether both loops are still reading.
    pub fn is_active(&self) -> bool {
        !self.responses.is_finished() && !self.packets.is_finished()
    }

    /// Whether the packet loop is still receiving telemetry.
    pub fn packets_active(&self) -> bool {
        !self.packets.is_finished()
    }

    /// Wait for either loop to end, then stop the other.
    ///
    /// Returns `Ok` when the radio closed the command connection, or the
    /// transport error that exhausted either loop's retries.
    pub async fn closed(mut self) -> Result<()> {
        let result = tokio::select! {
            result = &mut self.responses => {
                self.packets.abort();
                result
            }
            result = &mut self.packets => {
                self.responses.abort();
                result
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => Err(SessionError::Transport(std::io::Error::other(e))),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.responses.abort();
        self.packets.abort();
    }
}
