//! Bridge lifecycle state machine.
//!
//! ```text
//!                 both subscriptions acknowledged
//!  Uninitialized ───────────────────────────────▶ Running
//!        │                                           │
//!        │ subscription failed         read / frame / publish failure
//!        ▼                                           ▼
//!   Terminated ◀─────────────────────────────────────┘
//! ```
//!
//! `Terminated` is final: there is no supervised restart inside the process.
//! The host (systemd, a container runtime) observes the exit and decides.

use std::fmt;

/// Lifecycle state of a bridge engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BridgeState {
    /// Created; subscriptions not yet established.
    #[default]
    Uninitialized,
    /// Both subscriptions confirmed and the outbound pump is live.
    Running,
    /// A fatal condition occurred.  Final.
    Terminated,
}

impl BridgeState {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: BridgeState) -> bool {
        matches!(
            (self, next),
            (BridgeState::Uninitialized, BridgeState::Running)
                | (BridgeState::Uninitialized, BridgeState::Terminated)
                | (BridgeState::Running, BridgeState::Terminated)
        )
    }

    /// Returns `true` once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        self == BridgeState::Terminated
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeState::Uninitialized => "uninitialized",
            BridgeState::Running => "running",
            BridgeState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
