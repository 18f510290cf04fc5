//! Application layer for vnats-bridge.
//!
//! The application layer knows *what* to do with frames and messages, but
//! delegates *how* they move to the infrastructure layer through the traits in
//! [`ports`].
//!
//! # Responsibilities
//!
//! - Reading frames from the interface and publishing them to the right topic
//! - Subscribing to this node's unicast topic and the VLAN broadcast topic
//! - Writing received messages back into the interface, one at a time
//! - Tracking the bridge lifecycle state
//!
//! # What does NOT belong here?
//!
//! - Creating TAP devices or assigning IP addresses (infrastructure)
//! - MQTT connection handling (infrastructure)
//! - Configuration parsing (done in `main.rs`)

pub mod bridge_engine;
pub mod ports;

pub use bridge_engine::{BridgeEngine, BridgeError};
pub use ports::{BusClient, BusError, Delivery, DeliverySink, FrameTransport, TransportError};
