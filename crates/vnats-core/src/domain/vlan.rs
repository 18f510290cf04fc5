//! VLAN identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one virtual segment.
///
/// Configured once at process start and never changed afterwards.  It is the
/// first component of every topic name, so nodes configured with different
/// ids never exchange frames even when they share a bus.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VlanId(pub u32);

impl VlanId {
    /// Returns the raw numeric id.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for VlanId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
