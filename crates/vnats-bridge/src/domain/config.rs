//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is assembled once at startup (CLI flags, environment, optional TOML
//! file, built-in defaults) and then handed by value to the components that
//! need it.  Nothing reads configuration from global state afterwards.
//!
//! This module also owns the parsing of the individual settings that have a
//! textual form: the bus URL ([`BusEndpoint`]), the interface address
//! ([`InterfaceAddress`]), and the MQTT quality of service ([`QosLevel`]).

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use vnats_core::protocol::{DEFAULT_MTU, ETHERNET_HEADER_LEN};
use vnats_core::{MacAddr, VlanId};

/// Port used when a bus URL does not name one.
pub const DEFAULT_BUS_PORT: u16 = 1883;

/// Smallest MTU accepted (the IPv4 minimum).
pub const MIN_MTU: u16 = 68;

/// Shortest MQTT keep-alive accepted.  MQTT counts keep-alive in whole seconds.
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Errors produced while validating configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The bus URL could not be parsed.
    #[error("invalid bus URL {0:?}: expected mqtt://host[:port], tcp://host[:port] or host[:port]")]
    InvalidBusUrl(String),

    /// The interface address is not of the form `a.b.c.d/prefix`.
    #[error("invalid interface address {0:?}: expected IPv4 CIDR such as 10.1.0.11/16")]
    InvalidInterfaceAddress(String),

    /// MQTT QoS 2 is not supported; only 0 and 1 are.
    #[error("unsupported QoS level {0}: expected 0 or 1")]
    InvalidQos(u8),

    /// The MTU is below the IPv4 minimum.
    #[error("MTU {0} is below the minimum of {MIN_MTU}")]
    MtuTooSmall(u16),

    /// The inbound queue must hold at least one frame.
    #[error("inbound queue depth must be greater than zero")]
    ZeroQueueDepth,

    /// The keep-alive interval is shorter than one second.
    #[error("keep-alive {0:?} is shorter than {MIN_KEEP_ALIVE:?}")]
    KeepAliveTooShort(Duration),
}

// ── BusEndpoint ───────────────────────────────────────────────────────────────

/// Host and port of the MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEndpoint {
    pub host: String,
    pub port: u16,
}

impl Default for BusEndpoint {
    /// `mqtt://127.0.0.1:1883`
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_BUS_PORT,
        }
    }
}

impl FromStr for BusEndpoint {
    type Err = ConfigError;

    /// Accepts `mqtt://host[:port]`, `tcp://host[:port]`, or `host[:port]`.
    ///
    /// IPv6 hosts must be bracketed: `mqtt://[::1]:1883`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidBusUrl(s.to_string());

        let rest = match s.trim().split_once("://") {
            Some(("mqtt" | "tcp", rest)) => rest,
            Some(_) => return Err(invalid()),
            None => s.trim(),
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed.split_once(']').ok_or_else(invalid)?;
            let port = match after {
                "" => DEFAULT_BUS_PORT,
                p => p
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(invalid)?,
            };
            (host, port)
        } else {
            match rest.split_once(':') {
                Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
                None => (rest, DEFAULT_BUS_PORT),
            }
        };

        if host.is_empty() || host.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BusEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "mqtt://[{}]:{}", self.host, self.port)
        } else {
            write!(f, "mqtt://{}:{}", self.host, self.port)
        }
    }
}

// ── InterfaceAddress ──────────────────────────────────────────────────────────

/// IPv4 address and prefix length assigned to the TAP interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl InterfaceAddress {
    /// Returns the dotted netmask for the prefix length.
    ///
    /// ```rust
    /// use vnats_bridge::domain::InterfaceAddress;
    ///
    /// let a: InterfaceAddress = "10.1.0.11/16".parse().unwrap();
    /// assert_eq!(a.netmask().to_string(), "255.255.0.0");
    /// ```
    pub fn netmask(&self) -> Ipv4Addr {
        let bits = match self.prefix_len {
            0 => 0,
            n => u32::MAX << (32 - u32::from(n)),
        };
        Ipv4Addr::from(bits)
    }
}

impl Default for InterfaceAddress {
    /// `10.1.0.11/16`
    fn default() -> Self {
        Self {
            address: Ipv4Addr::new(10, 1, 0, 11),
            prefix_len: 16,
        }
    }
}

impl FromStr for InterfaceAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidInterfaceAddress(s.to_string());
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let address: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix.parse().map_err(|_| invalid())?;
        if prefix_len > 32 {
            return Err(invalid());
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }
}

impl fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

// ── QosLevel ──────────────────────────────────────────────────────────────────

/// MQTT quality of service used for publishes and subscriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum QosLevel {
    /// QoS 0: a publish is acknowledged once written to the network.
    #[default]
    AtMostOnce,
    /// QoS 1: a publish is acknowledged by the broker's PUBACK.
    AtLeastOnce,
}

impl TryFrom<u8> for QosLevel {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            other => Err(ConfigError::InvalidQos(other)),
        }
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QosLevel::AtMostOnce => write!(f, "0"),
            QosLevel::AtLeastOnce => write!(f, "1"),
        }
    }
}

// ── BridgeConfig ──────────────────────────────────────────────────────────────

/// All runtime configuration for one bridge process.
///
/// # Example
///
/// ```rust
/// use vnats_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.vlan.get(), 0);
/// assert_eq!(cfg.interface_name, "vnats0");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// The virtual segment this node joins.  Scopes every topic name.
    pub vlan: VlanId,

    /// MQTT broker to connect to.
    pub bus: BusEndpoint,

    /// MQTT client id.  `None` derives one from the VLAN and own address
    /// (see [`BridgeConfig::client_id_for`]).
    pub client_id: Option<String>,

    /// QoS for publishes and subscriptions.  Retain is always off.
    pub qos: QosLevel,

    /// MQTT keep-alive interval.
    pub keep_alive: Duration,

    /// Name of the TAP interface to create.
    pub interface_name: String,

    /// IPv4 address assigned to the TAP interface.
    pub interface_address: InterfaceAddress,

    /// Interface MTU: the largest frame payload, excluding the Ethernet header.
    pub mtu: u16,

    /// Capacity of the inbound delivery queue feeding the interface writer.
    pub queue_depth: usize,
}

impl BridgeConfig {
    /// Default inbound queue depth.
    pub const DEFAULT_QUEUE_DEPTH: usize = 256;

    /// Default MQTT keep-alive.
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5);

    /// Returns the default configuration for `vlan`.
    ///
    /// The interface is named `vnats<vlan>` so that several bridges for
    /// different VLANs can run side by side on one host.
    pub fn for_vlan(vlan: VlanId) -> Self {
        Self {
            vlan,
            bus: BusEndpoint::default(),
            client_id: None,
            qos: QosLevel::default(),
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            interface_name: default_interface_name(vlan),
            interface_address: InterfaceAddress::default(),
            mtu: DEFAULT_MTU,
            queue_depth: Self::DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Size of the frame read buffer: one full Ethernet header plus `mtu`.
    pub fn frame_capacity(&self) -> usize {
        usize::from(self.mtu) + ETHERNET_HEADER_LEN
    }

    /// Returns the MQTT client id to use, given this node's hardware address.
    pub fn client_id_for(&self, own: &MacAddr) -> String {
        match &self.client_id {
            Some(id) => id.clone(),
            None => format!("vnats-{}-{}", self.vlan, own.to_hex()),
        }
    }

    /// Checks the settings that cannot be expressed in their types.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MtuTooSmall`], [`ConfigError::ZeroQueueDepth`],
    /// or [`ConfigError::KeepAliveTooShort`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mtu < MIN_MTU {
            return Err(ConfigError::MtuTooSmall(self.mtu));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if self.keep_alive < MIN_KEEP_ALIVE {
            return Err(ConfigError::KeepAliveTooShort(self.keep_alive));
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    /// | Field             | Default                  |
    /// |-------------------|--------------------------|
    /// | vlan              | `0`                      |
    /// | bus               | `mqtt://127.0.0.1:1883`  |
    /// | qos               | `0`                      |
    /// | keep_alive        | 5 seconds                |
    /// | interface_name    | `vnats0`                 |
    /// | interface_address | `10.1.0.11/16`           |
    /// | mtu               | `1500`                   |
    /// | queue_depth       | `256`                    |
    fn default() -> Self {
        Self::for_vlan(VlanId::default())
    }
}

/// Returns `vnats<vlan>`, the default TAP interface name.
pub fn default_interface_name(vlan: VlanId) -> String {
    format!("vnats{vlan}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        // Arrange / Act
        let cfg = BridgeConfig::default();

        // Assert
        assert_eq!(cfg.vlan, VlanId(0));
        assert_eq!(cfg.bus.to_string(), "mqtt://127.0.0.1:1883");
        assert_eq!(cfg.qos, QosLevel::AtMostOnce);
        assert_eq!(cfg.keep_alive, Duration::from_secs(5));
        assert_eq!(cfg.interface_name, "vnats0");
        assert_eq!(cfg.interface_address.to_string(), "10.1.0.11/16");
        assert_eq!(cfg.mtu, 1500);
        assert_eq!(cfg.queue_depth, 256);
    }

    #[test]
    fn test_for_vlan_names_interface_after_vlan() {
        let cfg = BridgeConfig::for_vlan(VlanId(7));
        assert_eq!(cfg.interface_name, "vnats7");
    }

    #[test]
    fn test_frame_capacity_holds_header_plus_mtu() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.frame_capacity(), 1514);
    }

    #[test]
    fn test_client_id_derived_from_vlan_and_address() {
        let cfg = BridgeConfig::for_vlan(VlanId(7));
        let own = MacAddr::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(cfg.client_id_for(&own), "vnats-7-aabbccddeeff");
    }

    #[test]
    fn test_explicit_client_id_wins() {
        let cfg = BridgeConfig {
            client_id: Some("edge-01".to_string()),
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.client_id_for(&MacAddr::BROADCAST), "edge-01");
    }

    #[test]
    fn test_validate_rejects_small_mtu() {
        let cfg = BridgeConfig {
            mtu: 60,
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::MtuTooSmall(60)));
    }

    #[test]
    fn test_validate_rejects_zero_queue_depth() {
        let cfg = BridgeConfig {
            queue_depth: 0,
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroQueueDepth));
    }

    #[test]
    fn test_validate_rejects_sub_second_keep_alive() {
        let cfg = BridgeConfig {
            keep_alive: Duration::from_millis(500),
            ..BridgeConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::KeepAliveTooShort(Duration::from_millis(500)))
        );
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(BridgeConfig::default().validate().is_ok());
    }

    // ── BusEndpoint ───────────────────────────────────────────────────────────

    #[test]
    fn test_bus_url_with_mqtt_scheme_and_port() {
        let ep: BusEndpoint = "mqtt://broker.lan:8883".parse().unwrap();
        assert_eq!(ep.host, "broker.lan");
        assert_eq!(ep.port, 8883);
    }

    #[test]
    fn test_bus_url_tcp_scheme_without_port_uses_default() {
        let ep: BusEndpoint = "tcp://10.0.0.5".parse().unwrap();
        assert_eq!(ep.host, "10.0.0.5");
        assert_eq!(ep.port, DEFAULT_BUS_PORT);
    }

    #[test]
    fn test_bus_url_bare_host_port() {
        let ep: BusEndpoint = "localhost:1884".parse().unwrap();
        assert_eq!(ep, BusEndpoint { host: "localhost".into(), port: 1884 });
    }

    #[test]
    fn test_bus_url_bracketed_ipv6() {
        let ep: BusEndpoint = "mqtt://[::1]:1999".parse().unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, 1999);
        assert_eq!(ep.to_string(), "mqtt://[::1]:1999");
    }

    #[test]
    fn test_bus_url_unknown_scheme_is_rejected() {
        let result = "http://broker:1883".parse::<BusEndpoint>();
        assert!(matches!(result, Err(ConfigError::InvalidBusUrl(_))));
    }

    #[test]
    fn test_bus_url_bad_port_is_rejected() {
        assert!("mqtt://broker:notaport".parse::<BusEndpoint>().is_err());
        assert!("mqtt://broker:70000".parse::<BusEndpoint>().is_err());
    }

    #[test]
    fn test_bus_url_empty_host_is_rejected() {
        assert!("mqtt://:1883".parse::<BusEndpoint>().is_err());
        assert!("".parse::<BusEndpoint>().is_err());
    }

    // ── InterfaceAddress ──────────────────────────────────────────────────────

    #[test]
    fn test_interface_address_parses_cidr() {
        let a: InterfaceAddress = "192.168.77.2/24".parse().unwrap();
        assert_eq!(a.address, Ipv4Addr::new(192, 168, 77, 2));
        assert_eq!(a.prefix_len, 24);
        assert_eq!(a.netmask(), Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn test_interface_address_netmask_edges() {
        let zero = InterfaceAddress { address: Ipv4Addr::UNSPECIFIED, prefix_len: 0 };
        let host = InterfaceAddress { address: Ipv4Addr::LOCALHOST, prefix_len: 32 };
        assert_eq!(zero.netmask(), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(host.netmask(), Ipv4Addr::new(255, 255, 255, 255));
    }

    #[test]
    fn test_interface_address_requires_prefix() {
        let result = "10.1.0.11".parse::<InterfaceAddress>();
        assert!(matches!(result, Err(ConfigError::InvalidInterfaceAddress(_))));
    }

    #[test]
    fn test_interface_address_rejects_prefix_over_32() {
        assert!("10.1.0.11/33".parse::<InterfaceAddress>().is_err());
    }

    // ── QosLevel ──────────────────────────────────────────────────────────────

    #[test]
    fn test_qos_from_u8() {
        assert_eq!(QosLevel::try_from(0), Ok(QosLevel::AtMostOnce));
        assert_eq!(QosLevel::try_from(1), Ok(QosLevel::AtLeastOnce));
        assert_eq!(QosLevel::try_from(2), Err(ConfigError::InvalidQos(2)));
    }
}
