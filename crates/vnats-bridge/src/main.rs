//! vnats — entry point.
//!
//! Creates a TAP interface and bridges it onto an MQTT bus.  Every node
//! started with the same VLAN id against the same broker shares one Ethernet
//! segment.
//!
//! # Usage
//!
//! ```text
//! vnats [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>        Optional TOML configuration file
//!   -v, --vlan <ID>            VLAN id [default: 0]
//!   -n, --bus-url <URL>        MQTT broker URL [default: mqtt://127.0.0.1:1883]
//!       --client-id <ID>       MQTT client id [default: vnats-<vlan>-<mac>]
//!       --qos <0|1>            MQTT QoS [default: 0]
//!       --keep-alive <SECS>    MQTT keep-alive [default: 5]
//!       --interface <NAME>     TAP interface name [default: vnats<vlan>]
//!       --address <CIDR>       Interface IPv4 address [default: 10.1.0.11/16]
//!       --mtu <BYTES>          Interface MTU [default: 1500]
//!       --queue-depth <N>      Inbound frame queue depth [default: 256]
//!       --log-level <LEVEL>    Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! # Configuration precedence
//!
//! 1. Command-line flag
//! 2. Environment variable (`VNATS_VLAN`, `VNATS_BUS_URL`, ...)
//! 3. The `--config` file
//! 4. Built-in default
//!
//! # Exit status
//!
//! `0` after Ctrl+C.  Non-zero when setup fails or the bridge terminates.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vnats_bridge::domain::config::default_interface_name;
use vnats_bridge::domain::{BridgeConfig, BusEndpoint, InterfaceAddress, QosLevel};
use vnats_bridge::infrastructure::config_file::{load_config_file, FileConfig};
use vnats_core::VlanId;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bridges a TAP interface onto an MQTT bus as one virtual Ethernet segment.
///
/// Every flag is optional.  A flag left out falls back to the configuration
/// file (if `--config` is given) and then to the built-in default, which is
/// why the fields are `Option`s rather than carrying `default_value`s.
#[derive(Debug, Default, Parser)]
#[command(name = "vnats", about = "Virtual Ethernet segment over an MQTT bus", version)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "VNATS_CONFIG")]
    config: Option<PathBuf>,

    /// VLAN id.  Only nodes with the same id exchange frames.
    #[arg(short = 'v', long, env = "VNATS_VLAN")]
    vlan: Option<u32>,

    /// MQTT broker URL: mqtt://host[:port], tcp://host[:port] or host[:port].
    #[arg(short = 'n', long, env = "VNATS_BUS_URL")]
    bus_url: Option<String>,

    /// MQTT client id.  Must be unique per broker.
    #[arg(long, env = "VNATS_CLIENT_ID")]
    client_id: Option<String>,

    /// MQTT QoS for publishes and subscriptions (0 or 1).
    #[arg(long, env = "VNATS_QOS")]
    qos: Option<u8>,

    /// MQTT keep-alive interval in seconds.
    #[arg(long, env = "VNATS_KEEP_ALIVE")]
    keep_alive: Option<u64>,

    /// Name of the TAP interface to create.
    #[arg(long, env = "VNATS_INTERFACE")]
    interface: Option<String>,

    /// IPv4 address and prefix for the TAP interface.
    #[arg(long, env = "VNATS_ADDRESS")]
    address: Option<String>,

    /// TAP interface MTU in bytes.
    #[arg(long, env = "VNATS_MTU")]
    mtu: Option<u16>,

    /// Number of received frames that may wait for the interface writer.
    #[arg(long, env = "VNATS_QUEUE_DEPTH")]
    queue_depth: Option<usize>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "VNATS_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Reads the `--config` file, or returns all-default file settings.
    fn file_config(&self) -> anyhow::Result<FileConfig> {
        match &self.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("failed to load config file {}", path.display())),
            None => Ok(FileConfig::default()),
        }
    }

    /// Merges flags over `file` into a validated [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending value if the bus URL, interface
    /// address, or QoS cannot be parsed, or if the merged configuration fails
    /// [`BridgeConfig::validate`].
    fn into_bridge_config(&self, file: &FileConfig) -> anyhow::Result<BridgeConfig> {
        let vlan = self.vlan.map(VlanId).unwrap_or(file.bridge.vlan);

        let bus_url = self.bus_url.as_deref().unwrap_or(&file.bus.url);
        let bus: BusEndpoint = bus_url.parse().context("invalid --bus-url")?;

        let qos = match self.qos {
            Some(level) => QosLevel::try_from(level).context("invalid --qos")?,
            None => file.bus.qos,
        };

        let address = self.address.as_deref().unwrap_or(&file.interface.address);
        let interface_address: InterfaceAddress =
            address.parse().context("invalid --address")?;

        let interface_name = self
            .interface
            .clone()
            .or_else(|| file.interface.name.clone())
            .unwrap_or_else(|| default_interface_name(vlan));

        let config = BridgeConfig {
            vlan,
            bus,
            client_id: self.client_id.clone().or_else(|| file.bus.client_id.clone()),
            qos,
            keep_alive: Duration::from_secs(self.keep_alive.unwrap_or(file.bus.keep_alive_secs)),
            interface_name,
            interface_address,
            mtu: self.mtu.unwrap_or(file.interface.mtu),
            queue_depth: self.queue_depth.unwrap_or(file.bridge.queue_depth),
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Log level to fall back on when `RUST_LOG` is unset.
    fn log_level<'a>(&'a self, file: &'a FileConfig) -> &'a str {
        self.log_level.as_deref().unwrap_or(&file.bridge.log_level)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed with `clap`, and the `--config` file is read.
/// 2. `tracing_subscriber` is initialised.  `RUST_LOG` wins over the
///    configured log level.
/// 3. The TAP interface is created and its hardware address read.
/// 4. The MQTT connection is established.
/// 5. The bridge engine subscribes and pumps frames until it terminates or
///    Ctrl+C is pressed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = cli.file_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    let fallback = cli.log_level(&file).to_string();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();

    let config = cli.into_bridge_config(&file)?;
    info!(
        "vnats starting: vlan={} bus={} interface={} address={}",
        config.vlan, config.bus, config.interface_name, config.interface_address
    );

    run(config).await?;

    info!("vnats stopped");
    Ok(())
}

/// Builds the adapters and runs the bridge until Ctrl+C or a fatal error.
#[cfg(target_os = "linux")]
async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    use std::sync::Arc;

    use vnats_bridge::application::{BridgeEngine, FrameTransport};
    use vnats_bridge::infrastructure::mqtt::MqttBus;
    use vnats_bridge::infrastructure::tap::TapDevice;

    // The interface comes first: its hardware address names this node's topic
    // and, by default, its MQTT client id.
    let tap = Arc::new(TapDevice::open(&config)?);
    let client_id = config.client_id_for(&tap.hardware_address());
    let bus = Arc::new(MqttBus::connect(&config, &client_id).await?);

    let mut engine = BridgeEngine::new(&config, tap, bus);

    tokio::select! {
        result = engine.run() => {
            let err = match result {
                Ok(never) => match never {},
                Err(e) => e,
            };
            Err(err).context("bridge terminated")
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("received Ctrl+C, shutting down");
            Ok(())
        }
    }
}

#[cfg(not(target_os = "linux"))]
async fn run(_config: BridgeConfig) -> anyhow::Result<()> {
    anyhow::bail!("vnats needs Linux TAP support and cannot run on this platform")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Command, CommandFactory, FromArgMatches};

    /// The `Cli` command with every `VNATS_*` fallback removed, so the
    /// caller's environment cannot leak into parse results.
    fn command_without_env() -> Command {
        let mut cmd = Cli::command();
        let ids: Vec<String> = cmd
            .get_arguments()
            .map(|arg| arg.get_id().to_string())
            .collect();
        for id in ids {
            cmd = cmd.mut_arg(id, |arg| arg.env(None::<&'static str>));
        }
        cmd
    }

    fn parse(args: &[&str]) -> Cli {
        let matches = command_without_env().get_matches_from(args);
        Cli::from_arg_matches(&matches).unwrap()
    }

    fn resolve(args: &[&str]) -> anyhow::Result<BridgeConfig> {
        let cli = parse(args);
        cli.into_bridge_config(&FileConfig::default())
    }

    #[test]
    fn test_every_flag_declares_an_env_fallback() {
        let cmd = Cli::command();

        let without_env: Vec<_> = cmd
            .get_arguments()
            .filter(|arg| arg.get_env().is_none())
            .map(|arg| arg.get_id().to_string())
            .collect();

        assert!(without_env.is_empty(), "no env fallback: {without_env:?}");
        assert_eq!(
            cmd.get_arguments()
                .find(|arg| arg.get_id() == "vlan")
                .and_then(|arg| arg.get_env()),
            Some(std::ffi::OsStr::new("VNATS_VLAN"))
        );
    }

    #[test]
    fn test_parse_helper_ignores_environment() {
        let cmd = command_without_env();

        assert!(cmd.get_arguments().all(|arg| arg.get_env().is_none()));
    }

    #[test]
    fn test_cli_defaults_match_built_in_defaults() {
        // Arrange / Act: no flags, no file
        let config = resolve(&["vnats"]).unwrap();

        // Assert
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_cli_short_flags() {
        let config = resolve(&["vnats", "-v", "7", "-n", "mqtt://broker.lan:1884"]).unwrap();

        assert_eq!(config.vlan, VlanId(7));
        assert_eq!(config.bus.host, "broker.lan");
        assert_eq!(config.bus.port, 1884);
    }

    #[test]
    fn test_cli_vlan_renames_default_interface() {
        let config = resolve(&["vnats", "--vlan", "12"]).unwrap();
        assert_eq!(config.interface_name, "vnats12");
    }

    #[test]
    fn test_cli_explicit_interface_name_wins() {
        let config = resolve(&["vnats", "--vlan", "12", "--interface", "tap0"]).unwrap();
        assert_eq!(config.interface_name, "tap0");
    }

    #[test]
    fn test_cli_all_long_flags() {
        let config = resolve(&[
            "vnats",
            "--client-id",
            "edge-01",
            "--qos",
            "1",
            "--keep-alive",
            "30",
            "--address",
            "192.168.9.1/24",
            "--mtu",
            "9000",
            "--queue-depth",
            "16",
        ])
        .unwrap();

        assert_eq!(config.client_id.as_deref(), Some("edge-01"));
        assert_eq!(config.qos, QosLevel::AtLeastOnce);
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert_eq!(config.interface_address.to_string(), "192.168.9.1/24");
        assert_eq!(config.mtu, 9000);
        assert_eq!(config.queue_depth, 16);
    }

    #[test]
    fn test_cli_invalid_bus_url_returns_error() {
        assert!(resolve(&["vnats", "--bus-url", "http://broker"]).is_err());
    }

    #[test]
    fn test_cli_invalid_qos_returns_error() {
        assert!(resolve(&["vnats", "--qos", "2"]).is_err());
    }

    #[test]
    fn test_cli_invalid_address_returns_error() {
        assert!(resolve(&["vnats", "--address", "10.1.0.11"]).is_err());
    }

    #[test]
    fn test_cli_zero_queue_depth_fails_validation() {
        assert!(resolve(&["vnats", "--queue-depth", "0"]).is_err());
    }

    #[test]
    fn test_cli_zero_keep_alive_fails_validation() {
        assert!(resolve(&["vnats", "--keep-alive", "0"]).is_err());
    }

    #[test]
    fn test_file_values_apply_when_flags_absent() {
        // Arrange
        let file = FileConfig::from_toml_str(
            "[bridge]\nvlan = 3\n[bus]\nurl = \"tcp://10.0.0.2\"\n[interface]\nmtu = 1400\n",
        )
        .unwrap();
        let cli = parse(&["vnats"]);

        // Act
        let config = cli.into_bridge_config(&file).unwrap();

        // Assert
        assert_eq!(config.vlan, VlanId(3));
        assert_eq!(config.interface_name, "vnats3");
        assert_eq!(config.bus.to_string(), "mqtt://10.0.0.2:1883");
        assert_eq!(config.mtu, 1400);
    }

    #[test]
    fn test_flags_override_file_values() {
        let file = FileConfig::from_toml_str("[bridge]\nvlan = 3\nlog_level = \"warn\"\n").unwrap();
        let cli = parse(&["vnats", "--vlan", "4", "--log-level", "debug"]);

        let config = cli.into_bridge_config(&file).unwrap();

        assert_eq!(config.vlan, VlanId(4));
        assert_eq!(cli.log_level(&file), "debug");
    }

    #[test]
    fn test_log_level_falls_back_to_file() {
        let file = FileConfig::from_toml_str("[bridge]\nlog_level = \"warn\"\n").unwrap();
        let cli = Cli::default();

        assert_eq!(cli.log_level(&file), "warn");
    }
}
