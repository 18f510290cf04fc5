//! # vnats-core
//!
//! Shared library for vnats containing the hardware address type, the Ethernet
//! frame codec, and the topic scheme that maps frames onto bus topics.
//!
//! This crate has zero dependencies on OS APIs, network sockets, or async
//! runtimes.
//!
//! # Architecture overview (for beginners)
//!
//! vnats stretches one layer-2 network segment across a publish/subscribe
//! message bus.  Every node runs a TAP interface; frames read from the TAP are
//! published to a bus topic derived from the frame's destination address, and
//! messages arriving on this node's topics are written back into the TAP.
//!
//! This crate (`vnats-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – The value types: [`MacAddr`] (a 6-byte hardware address)
//!   and [`VlanId`] (the number that scopes one virtual segment's topics).
//!
//! - **`protocol`** – How frames map onto the bus.  The `frame` module reads
//!   the destination address out of a raw Ethernet frame and classifies it;
//!   the `topic` module turns (VLAN, address) pairs into topic strings such as
//!   `vlan.7.aabbccddeeff`.
//!
//! Two nodes that agree on the VLAN id compute identical topic strings
//! independently, so no address-resolution handshake is ever needed.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `vnats_core::MacAddr` instead of `vnats_core::domain::mac::MacAddr`.
pub use domain::mac::{MacAddr, MacAddrError};
pub use domain::vlan::VlanId;
pub use protocol::frame::{classify, destination_address, AddressClass, FrameError};
pub use protocol::topic::{broadcast_topic, unicast_topic, Topic};
