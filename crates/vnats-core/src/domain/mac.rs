//! Link-layer hardware (MAC) addresses.
//!
//! A [`MacAddr`] is six bytes.  Three textual forms appear in this project:
//!
//! | Form          | Example               | Used for                           |
//! |---------------|-----------------------|------------------------------------|
//! | colon display | `aa:bb:cc:dd:ee:ff`   | logs, `/sys/class/net/*/address`   |
//! | dash display  | `aa-bb-cc-dd-ee-ff`   | accepted on input only             |
//! | bare hex      | `aabbccddeeff`        | topic names (see `protocol::topic`)|
//!
//! # The group bit (for beginners)
//!
//! The least significant bit of the first octet is the I/G ("individual /
//! group") bit.  When it is `1` the frame is meant for a group of stations:
//! either the all-ones broadcast address `ff:ff:ff:ff:ff:ff` or one of the
//! multicast ranges (`01:00:5e:…` for IPv4, `33:33:…` for IPv6).  When it is
//! `0` the frame is meant for exactly one station.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a string cannot be parsed as a [`MacAddr`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacAddrError {
    /// The string is neither 17 characters (separated) nor 12 (bare hex).
    #[error("invalid hardware address length: {0:?}")]
    InvalidLength(String),

    /// A separator was missing or inconsistent.
    #[error("invalid hardware address separator in {0:?}")]
    InvalidSeparator(String),

    /// One of the octets is not valid hexadecimal.
    #[error("invalid hex digit in hardware address {0:?}")]
    InvalidHex(String),
}

/// A 6-byte link-layer hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Number of bytes in a hardware address.
    pub const LEN: usize = 6;

    /// The all-ones broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    /// Creates an address from its six octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the six octets of the address.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns `true` for the all-ones broadcast address only.
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    /// Returns `true` when the group (I/G) bit is set.
    ///
    /// The broadcast address is also a group address, so this returns `true`
    /// for it as well.
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Returns `true` when the address designates a single station.
    pub fn is_unicast(&self) -> bool {
        !self.is_group()
    }

    /// Encodes the address as 12 lowercase hex digits with no separators.
    ///
    /// ```rust
    /// use vnats_core::MacAddr;
    ///
    /// let addr = MacAddr::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    /// assert_eq!(addr.to_hex(), "aabbccddeeff");
    /// ```
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = MacAddrError;

    /// Parses `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff`, or `aabbccddeeff`.
    ///
    /// Hex digits may be upper or lower case.  Surrounding whitespace (such
    /// as the trailing newline in a sysfs file) is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        let digits: String = match trimmed.len() {
            12 => trimmed.to_string(),
            17 => {
                let bytes = trimmed.as_bytes();
                let sep = bytes[2];
                if sep != b':' && sep != b'-' {
                    return Err(MacAddrError::InvalidSeparator(trimmed.to_string()));
                }
                // Separators sit at every third position: 2, 5, 8, 11, 14.
                for (i, &b) in bytes.iter().enumerate() {
                    let is_sep_slot = i % 3 == 2;
                    if is_sep_slot && b != sep {
                        return Err(MacAddrError::InvalidSeparator(trimmed.to_string()));
                    }
                }
                trimmed.chars().filter(|&c| c != sep as char).collect()
            }
            _ => return Err(MacAddrError::InvalidLength(trimmed.to_string())),
        };

        let mut octets = [0u8; 6];
        hex::decode_to_slice(&digits, &mut octets)
            .map_err(|_| MacAddrError::InvalidHex(trimmed.to_string()))?;
        Ok(Self(octets))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
