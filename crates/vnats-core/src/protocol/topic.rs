//! Topic scheme: where on the bus a frame is published.
//!
//! Wire format:
//! ```text
//! broadcast:  vlan.<vlan-id>
//! unicast:    vlan.<vlan-id>.<12 lowercase hex digits of the hardware address>
//! ```
//!
//! Examples for VLAN 7:
//!
//! | Destination          | Topic                   |
//! |----------------------|-------------------------|
//! | `ff:ff:ff:ff:ff:ff`  | `vlan.7`                |
//! | `33:33:00:00:00:01`  | `vlan.7`                |
//! | `aa:bb:cc:dd:ee:ff`  | `vlan.7.aabbccddeeff`   |
//!
//! These strings are the only thing two nodes have to agree on.  Any
//! implementation that produces byte-identical topic names interoperates.
//!
//! The VLAN id is printed in decimal without padding and the address is
//! always exactly 12 hex digits, so distinct (vlan, address) pairs never
//! produce the same string, and a unicast topic can never equal a broadcast
//! topic (the latter has one dot, the former two).

use std::fmt;

use crate::domain::mac::MacAddr;
use crate::domain::vlan::VlanId;
use crate::protocol::frame::{classify, destination_address, AddressClass, FrameError};

/// First component of every topic name.
pub const TOPIC_PREFIX: &str = "vlan";

/// Returns the topic on which frames for `addr` are published.
///
/// ```rust
/// use vnats_core::{unicast_topic, MacAddr, VlanId};
///
/// let addr: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
/// assert_eq!(unicast_topic(VlanId(7), &addr), "vlan.7.aabbccddeeff");
/// ```
pub fn unicast_topic(vlan: VlanId, addr: &MacAddr) -> String {
    format!("{TOPIC_PREFIX}.{vlan}.{}", addr.to_hex())
}

/// Returns the topic shared by every node of `vlan`.
///
/// ```rust
/// use vnats_core::{broadcast_topic, VlanId};
///
/// assert_eq!(broadcast_topic(VlanId(7)), "vlan.7");
/// ```
pub fn broadcast_topic(vlan: VlanId) -> String {
    format!("{TOPIC_PREFIX}.{vlan}")
}

/// A topic in structured form.
///
/// `Display` produces the wire string, so `topic.to_string()` is what goes
/// to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// The segment-wide topic.
    Broadcast { vlan: VlanId },
    /// The topic of a single station.
    Unicast { vlan: VlanId, address: MacAddr },
}

impl Topic {
    /// Selects the topic a frame must be published to.
    ///
    /// Broadcast-class destinations go to the VLAN's broadcast topic; every
    /// other destination goes to that destination's unicast topic.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooShort`] if the frame has no complete header.
    pub fn for_frame(vlan: VlanId, frame: &[u8]) -> Result<Self, FrameError> {
        let dst = destination_address(frame)?;
        Ok(Self::for_destination(vlan, dst))
    }

    /// Selects the topic for a known destination address.
    pub fn for_destination(vlan: VlanId, dst: MacAddr) -> Self {
        match classify(&dst) {
            AddressClass::Broadcast => Topic::Broadcast { vlan },
            AddressClass::Unicast => Topic::Unicast { vlan, address: dst },
        }
    }

    /// Returns the VLAN this topic belongs to.
    pub fn vlan(&self) -> VlanId {
        match self {
            Topic::Broadcast { vlan } | Topic::Unicast { vlan, .. } => *vlan,
        }
    }

    /// Returns `true` for the segment-wide topic.
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Topic::Broadcast { .. })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Broadcast { vlan } => f.write_str(&broadcast_topic(*vlan)),
            Topic::Unicast { vlan, address } => f.write_str(&unicast_topic(*vlan, address)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
