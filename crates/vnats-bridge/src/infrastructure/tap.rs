//! Linux TAP device.
//!
//! # What is a TAP device? (for beginners)
//!
//! A TAP device is a virtual network card implemented by the kernel.  The
//! operating system routes traffic into it like into any other interface, but
//! instead of reaching a cable, every outgoing Ethernet frame is handed to
//! the process holding the device open.  Frames that process writes back
//! appear to the OS as if they had been received from the wire.
//!
//! (A TUN device is the layer-3 sibling that carries IP packets.  The bridge
//! needs whole Ethernet frames, so it asks the `tun` crate for
//! [`tun::Layer::L2`].)
//!
//! # Setup sequence
//!
//! 1. Create the device with the configured name, IPv4 address, netmask and
//!    MTU, and bring the link up.
//! 2. Read the kernel-assigned hardware address from
//!    `/sys/class/net/<name>/address`.  It determines this node's topic.
//!
//! Both steps need `CAP_NET_ADMIN`.

use std::path::PathBuf;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tracing::info;
use vnats_core::MacAddr;

use crate::application::ports::{FrameTransport, TransportError};
use crate::domain::config::BridgeConfig;

/// A layer-2 TAP interface opened for asynchronous frame I/O.
pub struct TapDevice {
    address: MacAddr,
    device: tun::AsyncDevice,
}

impl TapDevice {
    /// Creates and configures the TAP interface described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot be created (usually missing privileges or a
    /// name already in use) or if its hardware address cannot be read.
    pub fn open(config: &BridgeConfig) -> anyhow::Result<Self> {
        let name = config.interface_name.as_str();

        let mut tun_config = tun::Configuration::default();
        tun_config
            .tun_name(name)
            .layer(tun::Layer::L2)
            .address(config.interface_address.address)
            .netmask(config.interface_address.netmask())
            .mtu(config.mtu)
            .up();
        tun_config.platform_config(|platform| {
            platform.ensure_root_privileges(true);
        });

        let device = tun::create_as_async(&tun_config)
            .with_context(|| format!("failed to create TAP interface {name}"))?;
        let address = read_hardware_address(name)?;

        info!(
            "TAP interface {name} up: {} mtu {} hwaddr {address}",
            config.interface_address, config.mtu
        );

        Ok(Self { address, device })
    }
}

#[async_trait]
impl FrameTransport for TapDevice {
    fn hardware_address(&self) -> MacAddr {
        self.address
    }

    async fn read_frame(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.device.recv(buf).await?)
    }

    async fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        let written = self.device.send(frame).await?;
        if written != frame.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }
        Ok(())
    }
}

/// Reads the hardware address the kernel assigned to interface `name`.
fn read_hardware_address(name: &str) -> anyhow::Result<MacAddr> {
    let path = PathBuf::from("/sys/class/net").join(name).join("address");
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read hardware address from {}", path.display()))?;
    let address: MacAddr = text
        .parse()
        .with_context(|| format!("unexpected hardware address {:?} for {name}", text.trim()))?;
    if address.octets() == [0; 6] {
        bail!("interface {name} has no hardware address");
    }
    Ok(address)
}
