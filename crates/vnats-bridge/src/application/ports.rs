//! Ports: the two collaborators the bridge engine talks to.
//!
//! The engine depends only on these traits.  The infrastructure layer supplies
//! a TAP device and an MQTT client in production, and in-memory versions in
//! tests.
//!
//! # Delivery model
//!
//! Subscriptions do not take a callback.  Instead the engine hands the bus a
//! [`DeliverySink`] (the sending half of a bounded channel) and the bus pushes
//! one [`Delivery`] per received message into it from its own task.  The
//! engine's single writer task owns the receiving half, so every write to the
//! interface happens on that one task, one frame at a time.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use vnats_core::MacAddr;

/// Errors reported by a [`FrameTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying device returned an I/O error.
    #[error("interface I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device accepted only part of a frame.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// The device has been closed; no further frames will arrive.
    #[error("interface closed")]
    Closed,
}

/// Errors reported by a [`BusClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// The connection to the bus is gone; nothing further can be sent.
    #[error("bus connection lost")]
    Disconnected,

    /// The broker refused a subscription.
    #[error("subscription to {0} rejected by broker")]
    SubscriptionRejected(String),

    /// The client library reported an error while queueing a request.
    #[error("bus client error: {0}")]
    Client(String),
}

/// One message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Topic the message arrived on.
    pub topic: String,
    /// Message payload: one raw Ethernet frame.
    pub payload: Vec<u8>,
}

/// Sending half of the engine's inbound delivery queue.
pub type DeliverySink = mpsc::Sender<Delivery>;

/// A local virtual network interface carrying raw Ethernet frames.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Hardware address of the interface.  Determines this node's unicast topic.
    fn hardware_address(&self) -> MacAddr;

    /// Reads one frame into `buf`, returning its length.
    ///
    /// Waits until a frame is available.  Frames longer than `buf` are
    /// truncated by the device.
    async fn read_frame(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes one complete frame.
    async fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError>;
}

/// A publish/subscribe message bus.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Publishes `payload` to `topic` and waits for the bus to acknowledge it.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Subscribes to `topic` and waits for the bus to acknowledge it.
    ///
    /// Every message later received on `topic` is pushed into `sink`.  The bus
    /// keeps `sink` for as long as it is connected.
    async fn subscribe(&self, topic: &str, sink: DeliverySink) -> Result<(), BusError>;
}
