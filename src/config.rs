//! Session configuration.
//!
//! Configuration is a small JSON document. Every field has a default, so an
//! empty object (or no file at all) yields a usable configuration that only
//! needs a radio address.
//!
//! # Resolution order
//!
//! 1. `$RADIOLINK_CONFIG` (must exist if set)
//! 2. `<config dir>/radiolink/config.json` (XDG on Linux, Library on macOS)
//! 3. Built-in defaults
//!
//! `$RADIOLINK_ADDR` overrides `radio_addr` regardless of where the rest came
//! from.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// TCP port the radio accepts command connections on.
pub const DEFAULT_COMMAND_PORT: u16 = 4992;

/// Local UDP port the radio streams VITA-49 packets to.
pub const DEFAULT_UDP_PORT: u16 = 4991;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "RADIOLINK_CONFIG";

/// Environment variable overriding the radio address.
pub const ADDR_ENV: &str = "RADIOLINK_ADDR";

/// Status subscriptions sent right after connecting.
pub const DEFAULT_SUBSCRIPTIONS: &[&str] = &[
    "sub tx all",
    "sub atu all",
    "sub amplifier all",
    "sub meter all",
    "sub pan all",
    "sub slice all",
    "sub gps all",
    "sub audio_stream all",
    "sub cwx all",
    "sub xvtr all",
    "sub memories all",
    "sub daxiq all",
    "sub dax all",
    "sub usb_cable all",
];

/// Settings for one radio session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Radio host name or IP address.
    pub radio_addr: String,
    /// TCP port of the radio's command endpoint.
    pub command_port: u16,
    /// Local UDP port the radio sends telemetry to.
    pub udp_port: u16,
    /// Local address to bind the streaming socket to. Discovered from the
    /// default route when absent.
    pub local_ip: Option<IpAddr>,
    /// Size of each read from the command transport.
    pub read_buffer_size: usize,
    /// Receive buffer for one datagram; larger datagrams are truncated.
    pub datagram_buffer_size: usize,
    /// Capacity of each sink channel bound by the binary.
    pub sink_capacity: usize,
    /// Consecutive read failures tolerated before a loop gives up.
    pub max_read_retries: u32,
    /// Commands sent right after connecting, in order.
    pub subscriptions: Vec<String>,
    /// Log every response record at debug level.
    pub debug: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            radio_addr: "127.0.0.1".to_string(),
            command_port: DEFAULT_COMMAND_PORT,
            udp_port: DEFAULT_UDP_PORT,
            local_ip: None,
            read_buffer_size: 4096,
            datagram_buffer_size: 64000,
            sink_capacity: 64,
            max_read_retries: 10,
            subscriptions: DEFAULT_SUBSCRIPTIONS.iter().map(|s| s.to_string()).collect(),
            debug: false,
        }
    }
}

impl SessionConfig {
    /// Load configuration from the environment and default locations.
    pub fn load() -> Result<Self> {
        Self::resolve(
            std::env::var(CONFIG_ENV).ok(),
            default_config_path(),
            std::env::var(ADDR_ENV).ok(),
        )
    }

    /// Read a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SessionError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            SessionError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn resolve(
        explicit: Option<String>,
        default_path: Option<PathBuf>,
        addr_override: Option<String>,
    ) -> Result<Self> {
        let mut config = if let Some(path) = explicit {
            tracing::info!("Using configuration from {}: {}", CONFIG_ENV, path);
            Self::from_file(Path::new(&path))?
        } else {
            match default_path {
                Some(path) if path.exists() => {
                    tracing::info!("Using configuration from {}", path.display());
                    Self::from_file(&path)?
                }
                _ => Self::default(),
            }
        };

        if let Some(addr) = addr_override.filter(|a| !a.trim().is_empty()) {
            config.radio_addr = addr.trim().to_string();
        }

        Ok(config)
    }

    /// `host:port` of the radio's command endpoint.
    pub fn command_addr(&self) -> String {
        format!("{}:{}", self.radio_addr, self.command_port)
    }
}

/// Default configuration file location, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("radiolink").join("config.json"))
}
