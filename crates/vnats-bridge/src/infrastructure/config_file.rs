//! Optional TOML configuration file.
//!
//! The file is only read when `--config <path>` is given.  Values found here
//! sit between command-line flags (which win) and built-in defaults.
//!
//! # File layout
//!
//! ```toml
//! [bridge]
//! vlan = 7
//! queue_depth = 256
//! log_level = "info"
//!
//! [bus]
//! url = "mqtt://broker.lan:1883"
//! client_id = "edge-01"
//! qos = 0
//! keep_alive_secs = 5
//!
//! [interface]
//! name = "vnats7"
//! address = "10.1.0.11/16"
//! mtu = 1500
//! ```
//!
//! Every section and every field may be omitted.  Missing fields take the
//! value from their `#[serde(default = "...")]` helper, so an empty file is
//! equivalent to no file at all.
//!
//! Text-valued settings (`url`, `address`) are kept as strings here and parsed
//! by the domain types when the final [`BridgeConfig`] is assembled, so the
//! error message names the offending value whether it came from a flag or the
//! file.
//!
//! [`BridgeConfig`]: crate::domain::BridgeConfig

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use vnats_core::VlanId;

use crate::domain::config::{BridgeConfig, QosLevel};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level contents of the configuration file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub bus: BusSection,
    #[serde(default)]
    pub interface: InterfaceSection,
}

/// `[bridge]`: VLAN membership and process settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    /// VLAN to join.
    #[serde(default)]
    pub vlan: VlanId,
    /// Capacity of the inbound delivery queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// `[bus]`: MQTT broker connection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BusSection {
    /// Broker URL.
    #[serde(default = "default_bus_url")]
    pub url: String,
    /// MQTT client id.  Derived from the VLAN and own address when absent.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Publish/subscribe QoS, 0 or 1.
    #[serde(default)]
    pub qos: QosLevel,
    /// MQTT keep-alive in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

/// `[interface]`: TAP device settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InterfaceSection {
    /// Device name.  `vnats<vlan>` when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// IPv4 address and prefix, e.g. `"10.1.0.11/16"`.
    #[serde(default = "default_address")]
    pub address: String,
    /// Interface MTU.
    #[serde(default = "default_mtu")]
    pub mtu: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_queue_depth() -> usize {
    BridgeConfig::DEFAULT_QUEUE_DEPTH
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bus_url() -> String {
    BridgeConfig::default().bus.to_string()
}
fn default_keep_alive_secs() -> u64 {
    BridgeConfig::DEFAULT_KEEP_ALIVE.as_secs()
}
fn default_address() -> String {
    BridgeConfig::default().interface_address.to_string()
}
fn default_mtu() -> u16 {
    vnats_core::protocol::DEFAULT_MTU
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            vlan: VlanId::default(),
            queue_depth: default_queue_depth(),
            log_level: default_log_level(),
        }
    }
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
            client_id: None,
            qos: QosLevel::default(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl Default for InterfaceSection {
    fn default() -> Self {
        Self {
            name: None,
            address: default_address(),
            mtu: default_mtu(),
        }
    }
}

impl FileConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Parse`] for malformed TOML, unknown keys, or
    /// values of the wrong type (including a QoS other than 0 or 1).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(text)?)
    }
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] if the file cannot be read, or
/// [`ConfigFileError::Parse`] if its content is invalid.
pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FileConfig::from_toml_str(&text)?;
    tracing::debug!("loaded configuration from {}", path.display());
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
