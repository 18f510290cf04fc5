//! In-memory frame transport and message bus for testing.
//!
//! # Why in-memory doubles?
//!
//! The real adapters need a Linux TAP device (root privileges) and a running
//! MQTT broker.  Neither is available in a unit test, and neither lets a test
//! observe exactly what was written or published.
//!
//! [`MemoryTransport`] replaces the TAP device:
//!
//! - Frames to "read" are injected through a [`FrameInjector`].  Dropping the
//!   injector makes the next read fail with [`TransportError::Closed`].
//! - Every written frame is recorded in order.
//! - Writes can be made to fail, and overlapping writes are counted so tests
//!   can check that the interface is only ever written by one task at a time.
//!
//! [`MemoryBus`] replaces the MQTT broker:
//!
//! - Subscriptions are recorded per topic.
//! - Every publish is recorded, then delivered to the subscribers of that
//!   topic.  Two engines sharing one `MemoryBus` therefore talk to each other
//!   exactly as two bridges sharing a broker would.
//! - [`MemoryBus::deliver`] pushes a message to subscribers without recording
//!   it as a publish, standing in for a remote node.
//!
//! # Usage in tests
//!
//! ```rust
//! use vnats_bridge::application::FrameTransport;
//! use vnats_bridge::infrastructure::memory::MemoryTransport;
//! use vnats_core::MacAddr;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (transport, injector) = MemoryTransport::new(MacAddr::new([2, 0, 0, 0, 0, 1]));
//! injector.inject(vec![0xFF; 60]);
//!
//! let mut buf = [0u8; 1514];
//! assert_eq!(transport.read_frame(&mut buf).await.unwrap(), 60);
//! # }
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use vnats_core::MacAddr;

use crate::application::ports::{
    BusClient, BusError, Delivery, DeliverySink, FrameTransport, TransportError,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── MemoryTransport ───────────────────────────────────────────────────────────

type ReadResult = Result<Vec<u8>, io::ErrorKind>;

/// Feeds frames (or errors) to the reads of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct FrameInjector {
    tx: mpsc::UnboundedSender<ReadResult>,
}

impl FrameInjector {
    /// Queues one frame to be returned by a future read.
    pub fn inject(&self, frame: impl Into<Vec<u8>>) {
        // A dropped transport has nobody left to read.
        let _ = self.tx.send(Ok(frame.into()));
    }

    /// Queues an I/O error to be returned by a future read.
    pub fn inject_error(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(Err(kind));
    }
}

/// A [`FrameTransport`] backed by memory instead of a device.
pub struct MemoryTransport {
    address: MacAddr,
    reads: tokio::sync::Mutex<mpsc::UnboundedReceiver<ReadResult>>,
    written: Mutex<Vec<Vec<u8>>>,
    write_signal: Notify,
    fail_writes: AtomicUsize,
    writing: AtomicBool,
    overlaps: AtomicUsize,
}

impl MemoryTransport {
    /// Creates a transport with hardware address `address`, and the injector
    /// that feeds its reads.
    pub fn new(address: MacAddr) -> (Arc<Self>, FrameInjector) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            address,
            reads: tokio::sync::Mutex::new(rx),
            written: Mutex::new(Vec::new()),
            write_signal: Notify::new(),
            fail_writes: AtomicUsize::new(0),
            writing: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
        });
        (transport, FrameInjector { tx })
    }

    /// Makes the next `count` writes fail with an I/O error.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_writes.store(count, Ordering::SeqCst);
    }

    /// Returns every successfully written frame, in write order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.written).clone()
    }

    /// Waits until at least `count` frames have been written, then returns
    /// all written frames.
    pub async fn wait_for_writes(&self, count: usize) -> Vec<Vec<u8>> {
        loop {
            let notified = self.write_signal.notified();
            {
                let written = lock(&self.written);
                if written.len() >= count {
                    return written.clone();
                }
            }
            notified.await;
        }
    }

    /// Number of times a write started while another was still in progress.
    pub fn overlapping_writes(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn take_write_failure(&self) -> bool {
        self.fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl FrameTransport for MemoryTransport {
    fn hardware_address(&self) -> MacAddr {
        self.address
    }

    /// Returns the next injected frame, truncated to `buf`, or
    /// [`TransportError::Closed`] once the injector is gone.
    async fn read_frame(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let next = self.reads.lock().await.recv().await;
        match next {
            Some(Ok(frame)) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            Some(Err(kind)) => Err(io::Error::from(kind).into()),
            None => Err(TransportError::Closed),
        }
    }

    /// Records the frame.  Yields once mid-write so that a second concurrent
    /// writer, if there were one, would be caught in the act.
    async fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.writing.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::task::yield_now().await;

        let result = if self.take_write_failure() {
            Err(io::Error::new(io::ErrorKind::Other, "memory transport write failure").into())
        } else {
            lock(&self.written).push(frame.to_vec());
            Ok(())
        };

        self.writing.store(false, Ordering::SeqCst);
        self.write_signal.notify_waiters();
        result
    }
}

// ── MemoryBus ─────────────────────────────────────────────────────────────────

/// A [`BusClient`] that routes messages in memory.
#[derive(Default)]
pub struct MemoryBus {
    subscribers: Mutex<HashMap<String, Vec<DeliverySink>>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    publish_signal: Notify,
    rejected: Mutex<Vec<String>>,
    fail_publish: AtomicBool,
}

impl MemoryBus {
    /// Creates an empty bus.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// When `true`, every publish fails with [`BusError::Disconnected`].
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Makes any later subscription to `topic` fail.
    pub fn reject_subscription(&self, topic: &str) {
        lock(&self.rejected).push(topic.to_string());
    }

    /// Returns the subscribed topics, sorted.
    pub fn subscribed_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = lock(&self.subscribers).keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Returns `true` if anyone is subscribed to `topic`.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        lock(&self.subscribers).contains_key(topic)
    }

    /// Returns every acknowledged publish as `(topic, payload)`, in order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.published).clone()
    }

    /// Waits until at least `count` publishes have been acknowledged, then
    /// returns all of them.
    pub async fn wait_for_publishes(&self, count: usize) -> Vec<(String, Vec<u8>)> {
        loop {
            let notified = self.publish_signal.notified();
            {
                let published = lock(&self.published);
                if published.len() >= count {
                    return published.clone();
                }
            }
            notified.await;
        }
    }

    /// Delivers a message to the subscribers of `topic`, as if a remote node
    /// had published it.  Returns how many subscribers received it.
    pub async fn deliver(&self, topic: &str, payload: impl Into<Vec<u8>>) -> usize {
        let payload = payload.into();
        // Clone the sinks out so the lock is not held across `send().await`.
        let sinks = lock(&self.subscribers)
            .get(topic)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for sink in sinks {
            let delivery = Delivery {
                topic: topic.to_string(),
                payload: payload.clone(),
            };
            if sink.send(delivery).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[async_trait]
impl BusClient for MemoryBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::Disconnected);
        }
        lock(&self.published).push((topic.to_string(), payload.to_vec()));
        self.publish_signal.notify_waiters();
        self.deliver(topic, payload).await;
        Ok(())
    }

    async fn subscribe(&self, topic: &str, sink: DeliverySink) -> Result<(), BusError> {
        if lock(&self.rejected).iter().any(|t| t == topic) {
            return Err(BusError::SubscriptionRejected(topic.to_string()));
        }
        lock(&self.subscribers)
            .entry(topic.to_string())
            .or_default()
            .push(sink);
        Ok(())
    }
}
