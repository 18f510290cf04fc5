//! The bridge engine: interface ↔ bus forwarding.
//!
//! # Data flow
//!
//! ```text
//!                  outbound pump (one loop, one frame in flight)
//!  FrameTransport ──read_frame──▶ Topic::for_frame ──publish + ack──▶ BusClient
//!
//!                  inbound (two subscriptions, one writer)
//!  BusClient ──vlan.<id>.<own mac>──┐
//!                                   ├──▶ bounded queue ──▶ writer task ──write_frame──▶ FrameTransport
//!  BusClient ──vlan.<id>────────────┘
//! ```
//!
//! # Error policy
//!
//! The two directions fail differently:
//!
//! - **Outbound** – a failed read, a frame too short to carry a header, or a
//!   failed publish ends the pump.  The engine moves to
//!   [`BridgeState::Terminated`] and [`BridgeEngine::run`] returns the error.
//! - **Inbound** – a failed write drops that one frame and logs a warning.
//!   The writer keeps serving the queue.
//!
//! # Zero-length reads
//!
//! A read that returns 0 bytes carries no frame.  The pump skips it and reads
//! again.  A run of [`MAX_CONSECUTIVE_EMPTY_READS`] of them in a row ends the
//! pump with [`TransportError::Closed`].

use std::convert::Infallible;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use vnats_core::{broadcast_topic, unicast_topic, FrameError, MacAddr, Topic, VlanId};

use crate::application::ports::{
    BusClient, BusError, Delivery, FrameTransport, TransportError,
};
use crate::domain::config::BridgeConfig;
use crate::domain::state::BridgeState;

/// Consecutive zero-length reads after which the interface counts as closed.
pub const MAX_CONSECUTIVE_EMPTY_READS: u32 = 64;

// ── Error type ────────────────────────────────────────────────────────────────

/// Fatal bridge errors.  Every variant ends in [`BridgeState::Terminated`],
/// except [`BridgeError::InvalidState`] which leaves the state untouched.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A subscription was not acknowledged; startup aborted.
    #[error("failed to subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: BusError,
    },

    /// Reading from the interface failed.
    #[error("failed to read frame from interface: {0}")]
    Read(#[source] TransportError),

    /// The interface produced a frame without a complete Ethernet header.
    #[error("malformed frame from interface: {0}")]
    MalformedFrame(#[from] FrameError),

    /// A publish was not acknowledged.
    #[error("failed to publish frame to {topic}: {source}")]
    Publish {
        topic: String,
        #[source]
        source: BusError,
    },

    /// The requested operation is not allowed in the current state.
    #[error("operation not allowed while bridge is {0}")]
    InvalidState(BridgeState),
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Forwards frames between one [`FrameTransport`] and one [`BusClient`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vnats_bridge::application::BridgeEngine;
/// use vnats_bridge::domain::{BridgeConfig, BridgeState};
/// use vnats_bridge::infrastructure::memory::{MemoryBus, MemoryTransport};
/// use vnats_core::{MacAddr, VlanId};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let own: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
/// let (transport, _injector) = MemoryTransport::new(own);
/// let bus = MemoryBus::new();
///
/// let mut engine = BridgeEngine::new(&BridgeConfig::for_vlan(VlanId(7)), transport, bus.clone());
/// engine.start().await.unwrap();
///
/// assert_eq!(engine.state(), BridgeState::Running);
/// assert!(bus.is_subscribed("vlan.7.aabbccddeeff"));
/// assert!(bus.is_subscribed("vlan.7"));
/// # }
/// ```
pub struct BridgeEngine {
    vlan: VlanId,
    own_address: MacAddr,
    frame_capacity: usize,
    queue_depth: usize,
    transport: Arc<dyn FrameTransport>,
    bus: Arc<dyn BusClient>,
    state: watch::Sender<BridgeState>,
    writer: Option<JoinHandle<()>>,
}

impl BridgeEngine {
    /// Creates an engine in the [`BridgeState::Uninitialized`] state.
    ///
    /// Only `vlan`, `mtu`, and `queue_depth` are taken from `config`; the
    /// interface and bus settings were already used to build `transport` and
    /// `bus`.
    pub fn new(
        config: &BridgeConfig,
        transport: Arc<dyn FrameTransport>,
        bus: Arc<dyn BusClient>,
    ) -> Self {
        let (state, _) = watch::channel(BridgeState::Uninitialized);
        Self {
            vlan: config.vlan,
            own_address: transport.hardware_address(),
            frame_capacity: config.frame_capacity(),
            queue_depth: config.queue_depth.max(1),
            transport,
            bus,
            state,
            writer: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    /// Hardware address of the local interface.
    pub fn own_address(&self) -> MacAddr {
        self.own_address
    }

    /// Topic carrying frames addressed to this node.
    pub fn own_topic(&self) -> String {
        unicast_topic(self.vlan, &self.own_address)
    }

    /// Topic carrying frames addressed to every node of the VLAN.
    pub fn broadcast_topic(&self) -> String {
        broadcast_topic(self.vlan)
    }

    /// Starts the inbound path: spawns the writer task and subscribes to the
    /// own and broadcast topics.
    ///
    /// On success the engine is [`BridgeState::Running`].  The outbound pump
    /// is not started; call [`BridgeEngine::run_outbound_pump`] next, or use
    /// [`BridgeEngine::run`] to do both.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidState`] if the engine was already started.
    /// - [`BridgeError::Subscribe`] if either subscription fails; the engine
    ///   is then [`BridgeState::Terminated`].
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        let current = self.state();
        if current != BridgeState::Uninitialized {
            return Err(BridgeError::InvalidState(current));
        }

        // The writer must own the receiving half before any subscription can
        // deliver.
        let (sink, queue) = mpsc::channel(self.queue_depth);
        self.writer = Some(tokio::spawn(run_inbound_writer(
            queue,
            Arc::clone(&self.transport),
        )));

        for topic in [self.own_topic(), self.broadcast_topic()] {
            if let Err(source) = self.bus.subscribe(&topic, sink.clone()).await {
                error!("subscription to {topic} failed: {source}");
                self.terminate();
                return Err(BridgeError::Subscribe { topic, source });
            }
            info!("subscribed to {topic}");
        }

        self.transition(BridgeState::Running);
        info!(
            "bridge running on vlan {} as {}",
            self.vlan, self.own_address
        );
        Ok(())
    }

    /// Runs the outbound pump until a fatal error occurs.
    ///
    /// Each iteration reads one frame, selects its topic, publishes it, and
    /// waits for the acknowledgment before reading the next one, so frames
    /// reach the bus in exactly the order they were read.
    ///
    /// Always returns an error.  Unless it is [`BridgeError::InvalidState`],
    /// the engine is [`BridgeState::Terminated`] afterwards.
    pub async fn run_outbound_pump(&mut self) -> BridgeError {
        let current = self.state();
        if current != BridgeState::Running {
            return BridgeError::InvalidState(current);
        }

        let err = match self.pump().await {
            Ok(never) => match never {},
            Err(e) => e,
        };
        error!("outbound pump stopped: {err}");
        self.terminate();
        err
    }

    /// Starts the engine and runs the outbound pump.
    ///
    /// Returns only on a fatal condition.
    ///
    /// # Errors
    ///
    /// Any [`BridgeError`] from [`BridgeEngine::start`] or
    /// [`BridgeEngine::run_outbound_pump`].
    pub async fn run(&mut self) -> Result<Infallible, BridgeError> {
        self.start().await?;
        Err(self.run_outbound_pump().await)
    }

    async fn pump(&self) -> Result<Infallible, BridgeError> {
        let mut buf = vec![0u8; self.frame_capacity];
        let mut empty_reads = 0u32;

        loop {
            // Every read is offered the full buffer; only the first `len`
            // bytes belong to the frame just read.
            let len = self
                .transport
                .read_frame(&mut buf)
                .await
                .map_err(BridgeError::Read)?;
            if len == 0 {
                empty_reads += 1;
                if empty_reads >= MAX_CONSECUTIVE_EMPTY_READS {
                    warn!("{empty_reads} consecutive zero-length reads; treating interface as closed");
                    return Err(BridgeError::Read(TransportError::Closed));
                }
                trace!("zero-length read from interface; skipping");
                continue;
            }
            empty_reads = 0;
            let frame = &buf[..len];

            let topic = Topic::for_frame(self.vlan, frame)?.to_string();
            self.bus
                .publish(&topic, frame)
                .await
                .map_err(|source| BridgeError::Publish {
                    topic: topic.clone(),
                    source,
                })?;
            trace!("published {len} byte frame to {topic}");
        }
    }

    fn transition(&self, next: BridgeState) {
        let previous = self.state.send_replace(next);
        debug_assert!(
            previous.can_transition_to(next),
            "illegal bridge transition {previous} -> {next}"
        );
        debug!("bridge state {previous} -> {next}");
    }

    fn terminate(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if !self.state().is_terminal() {
            self.transition(BridgeState::Terminated);
        }
    }
}

impl Drop for BridgeEngine {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

// ── Inbound writer ────────────────────────────────────────────────────────────

/// Drains the delivery queue into the interface, one frame at a time.
///
/// Runs until every [`crate::application::ports::DeliverySink`] has been
/// dropped or the task is aborted.
async fn run_inbound_writer(
    mut queue: mpsc::Receiver<Delivery>,
    transport: Arc<dyn FrameTransport>,
) {
    while let Some(delivery) = queue.recv().await {
        match transport.write_frame(&delivery.payload).await {
            Ok(()) => trace!(
                "wrote {} byte frame from {}",
                delivery.payload.len(),
                delivery.topic
            ),
            Err(e) => warn!(
                "dropping {} byte frame from {}: {e}",
                delivery.payload.len(),
                delivery.topic
            ),
        }
    }
    debug!("inbound delivery queue closed; writer exiting");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
