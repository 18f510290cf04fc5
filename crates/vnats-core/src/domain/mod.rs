//! Domain value types for vnats.
//!
//! This module contains plain data with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! - [`mac::MacAddr`] – a link-layer hardware address, the thing every
//!   Ethernet frame is addressed to.
//! - [`vlan::VlanId`] – the identifier of the virtual segment.  Every topic
//!   name is prefixed with it so several independent segments can share one
//!   bus without seeing each other's traffic.

pub mod mac;
pub mod vlan;
