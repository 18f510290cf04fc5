//! Domain layer for vnats-bridge.
//!
//! The domain layer contains plain types with no dependencies on I/O,
//! networking, or async runtimes.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures and the parsing of individual settings
//! - The bridge lifecycle state machine
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, TAP, or MQTT types
//! - File I/O or environment variable reading

pub mod config;
pub mod state;

pub use config::{BridgeConfig, BusEndpoint, ConfigError, InterfaceAddress, QosLevel};
pub use state::BridgeState;
