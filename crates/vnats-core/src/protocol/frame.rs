//! Ethernet frame address codec.
//!
//! Wire layout of the part of an Ethernet II frame this module looks at:
//! ```text
//! [destination:6][source:6][ethertype:2][payload:N]
//! ```
//! Total header size: 14 bytes.  Nothing past the header is inspected; the
//! payload travels across the bus untouched.

use thiserror::Error;

use crate::domain::mac::MacAddr;

/// Length of the Ethernet II header (destination + source + ethertype).
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Default interface MTU (maximum payload per frame) in bytes.
pub const DEFAULT_MTU: u16 = 1500;

/// Errors raised while reading addresses out of a raw frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame does not contain a complete Ethernet header.
    #[error("frame too short: need at least {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },
}

/// How a destination address must be delivered on the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressClass {
    /// Exactly one station is addressed.
    Unicast,
    /// Every station on the segment receives the frame.
    ///
    /// Covers the all-ones broadcast address and every multicast group.
    Broadcast,
}

/// Returns the destination hardware address of `frame`.
///
/// # Errors
///
/// Returns [`FrameError::TooShort`] when `frame` is shorter than
/// [`ETHERNET_HEADER_LEN`].
///
/// # Examples
///
/// ```rust
/// use vnats_core::{destination_address, MacAddr};
///
/// let mut frame = vec![0xFF; 6];
/// frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01, 0x08, 0x06]);
/// assert_eq!(destination_address(&frame).unwrap(), MacAddr::BROADCAST);
/// ```
pub fn destination_address(frame: &[u8]) -> Result<MacAddr, FrameError> {
    read_address(frame, 0)
}

/// Returns the source hardware address of `frame`.
///
/// # Errors
///
/// Returns [`FrameError::TooShort`] when `frame` is shorter than
/// [`ETHERNET_HEADER_LEN`].
pub fn source_address(frame: &[u8]) -> Result<MacAddr, FrameError> {
    read_address(frame, MacAddr::LEN)
}

/// Classifies a destination address.
///
/// Any address with the group bit set is [`AddressClass::Broadcast`]; every
/// other address is [`AddressClass::Unicast`].
pub fn classify(addr: &MacAddr) -> AddressClass {
    if addr.is_group() {
        AddressClass::Broadcast
    } else {
        AddressClass::Unicast
    }
}

fn read_address(frame: &[u8], offset: usize) -> Result<MacAddr, FrameError> {
    // A full header is required even for the destination field: a frame that
    // stops inside the header was cut short by the transport.
    if frame.len() < ETHERNET_HEADER_LEN {
        return Err(FrameError::TooShort {
            needed: ETHERNET_HEADER_LEN,
            available: frame.len(),
        });
    }

    let mut octets = [0u8; MacAddr::LEN];
    octets.copy_from_slice(&frame[offset..offset + MacAddr::LEN]);
    Ok(MacAddr::new(octets))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
