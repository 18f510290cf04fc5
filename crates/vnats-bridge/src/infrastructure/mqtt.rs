//! MQTT implementation of the [`BusClient`] port.
//!
//! # How rumqttc is driven
//!
//! `rumqttc` splits a connection into two halves:
//!
//! - [`AsyncClient`] queues requests (publish, subscribe) and returns as soon
//!   as the request is queued.  It does not wait for the broker.
//! - [`EventLoop`] owns the socket.  Every call to `poll()` performs network
//!   I/O and yields one [`Event`]: either a packet received from the broker
//!   (`Event::Incoming`) or a packet just written to it (`Event::Outgoing`).
//!
//! [`MqttBus`] runs the event loop in a background task and turns the events
//! back into per-call acknowledgments:
//!
//! ```text
//!  publish()/subscribe()                       event loop task
//!  ─────────────────────                       ───────────────
//!  push waiter ──▶ Router.queued  ◀── Outgoing::Publish(pkid) / Outgoing::Subscribe(pkid)
//!  client.publish()                     │ QoS 0 publish: resolve now
//!                                       ▼ otherwise
//!                                 Router.inflight[pkid] ◀── PubAck(pkid) / SubAck(pkid)
//!  waiter.await ◀─────────────────────────────────────────── resolve
//! ```
//!
//! Requests reach the event loop in the order they were queued, and it emits
//! one `Outgoing` event per request in that same order.  A FIFO of waiters is
//! therefore enough to pair each `Outgoing` event with its caller.  The
//! `request_gate` keeps "push waiter" and "queue request" together so that
//! two concurrent callers cannot swap places between the two steps.
//!
//! Incoming PUBLISH packets are routed by exact topic to the
//! [`DeliverySink`]s registered through [`BusClient::subscribe`].
//!
//! # Connection loss
//!
//! There is no reconnect.  When `poll()` fails, every pending and future
//! request fails with [`BusError::Disconnected`], which terminates the bridge.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::application::ports::{BusClient, BusError, Delivery, DeliverySink};
use crate::domain::config::{BridgeConfig, QosLevel};

/// Capacity of the rumqttc request channel.
const REQUEST_CAPACITY: usize = 64;

/// Bytes allowed on top of the frame itself for the MQTT fixed header,
/// topic name, and packet id.
const PACKET_OVERHEAD: usize = 1024;

type Waiter = oneshot::Sender<Result<(), BusError>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_mqtt_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Bookkeeping shared between request callers and the event loop task.
#[derive(Default)]
struct Router {
    qos: QosLevel,
    sinks: HashMap<String, Vec<DeliverySink>>,
    queued_publishes: VecDeque<Waiter>,
    inflight_publishes: HashMap<u16, Waiter>,
    queued_subscribes: VecDeque<(String, Waiter)>,
    inflight_subscribes: HashMap<u16, (String, Waiter)>,
    closed: bool,
}

impl Router {
    fn new(qos: QosLevel) -> Self {
        Self {
            qos,
            ..Self::default()
        }
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed {
            Err(BusError::Disconnected)
        } else {
            Ok(())
        }
    }

    fn sinks_for(&self, topic: &str) -> Vec<DeliverySink> {
        self.sinks.get(topic).cloned().unwrap_or_default()
    }

    fn on_outgoing_publish(&mut self, pkid: u16) {
        let Some(waiter) = self.queued_publishes.pop_front() else {
            warn!("outgoing publish {pkid} has no caller");
            return;
        };
        match self.qos {
            QosLevel::AtMostOnce => {
                let _ = waiter.send(Ok(()));
            }
            QosLevel::AtLeastOnce => {
                self.inflight_publishes.insert(pkid, waiter);
            }
        }
    }

    fn on_puback(&mut self, pkid: u16) {
        match self.inflight_publishes.remove(&pkid) {
            Some(waiter) => {
                let _ = waiter.send(Ok(()));
            }
            None => debug!("PUBACK for unknown packet {pkid}"),
        }
    }

    fn on_outgoing_subscribe(&mut self, pkid: u16) {
        match self.queued_subscribes.pop_front() {
            Some(pending) => {
                self.inflight_subscribes.insert(pkid, pending);
            }
            None => warn!("outgoing subscribe {pkid} has no caller"),
        }
    }

    fn on_suback(&mut self, pkid: u16, return_codes: &[SubscribeReasonCode]) {
        let Some((topic, waiter)) = self.inflight_subscribes.remove(&pkid) else {
            debug!("SUBACK for unknown packet {pkid}");
            return;
        };
        let accepted = !return_codes.is_empty()
            && return_codes
                .iter()
                .all(|code| matches!(code, SubscribeReasonCode::Success(_)));
        if accepted {
            let _ = waiter.send(Ok(()));
        } else {
            self.sinks.remove(&topic);
            let _ = waiter.send(Err(BusError::SubscriptionRejected(topic)));
        }
    }

    /// Fails every pending request and refuses new ones.
    fn close(&mut self) {
        self.closed = true;
        self.sinks.clear();
        let publishes = self
            .queued_publishes
            .drain(..)
            .chain(self.inflight_publishes.drain().map(|(_, w)| w));
        let subscribes = self
            .queued_subscribes
            .drain(..)
            .chain(self.inflight_subscribes.drain().map(|(_, p)| p))
            .map(|(_, w)| w);
        for waiter in publishes.chain(subscribes) {
            let _ = waiter.send(Err(BusError::Disconnected));
        }
    }
}

// ── MqttBus ───────────────────────────────────────────────────────────────────

/// A [`BusClient`] connected to an MQTT broker.
pub struct MqttBus {
    client: AsyncClient,
    qos: QoS,
    router: Arc<Mutex<Router>>,
    request_gate: tokio::sync::Mutex<()>,
    event_loop: JoinHandle<()>,
}

impl MqttBus {
    /// Connects to the broker named in `config` and waits for it to accept
    /// the session.
    ///
    /// The session is clean (no state survives a previous run) and the
    /// maximum packet size is raised to fit a full frame.
    ///
    /// # Errors
    ///
    /// Fails if the broker cannot be reached or refuses the connection.
    pub async fn connect(config: &BridgeConfig, client_id: &str) -> anyhow::Result<Self> {
        let mut options = MqttOptions::new(client_id, config.bus.host.as_str(), config.bus.port);
        options
            .set_keep_alive(config.keep_alive)
            .set_clean_session(true);
        let max_packet = config.frame_capacity() + PACKET_OVERHEAD;
        options.set_max_packet_size(max_packet, max_packet);

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        wait_for_connack(&mut event_loop)
            .await
            .with_context(|| format!("failed to connect to MQTT broker at {}", config.bus))?;
        info!("connected to MQTT broker at {} as {client_id}", config.bus);

        let router = Arc::new(Mutex::new(Router::new(config.qos)));
        let event_loop = tokio::spawn(drive_event_loop(event_loop, Arc::clone(&router)));

        Ok(Self {
            client,
            qos: to_mqtt_qos(config.qos),
            router,
            request_gate: tokio::sync::Mutex::new(()),
            event_loop,
        })
    }

    /// Returns `false` once the connection to the broker has been lost.
    pub fn is_connected(&self) -> bool {
        !lock(&self.router).closed
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

#[async_trait]
impl BusClient for MqttBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        let (waiter, ack) = oneshot::channel();
        {
            let _gate = self.request_gate.lock().await;
            {
                let mut router = lock(&self.router);
                router.ensure_open()?;
                router.queued_publishes.push_back(waiter);
            }
            if let Err(e) = self
                .client
                .publish(topic, self.qos, false, payload.to_vec())
                .await
            {
                lock(&self.router).queued_publishes.pop_back();
                return Err(BusError::Client(e.to_string()));
            }
        }
        ack.await.unwrap_or(Err(BusError::Disconnected))
    }

    async fn subscribe(&self, topic: &str, sink: DeliverySink) -> Result<(), BusError> {
        let (waiter, ack) = oneshot::channel();
        {
            let _gate = self.request_gate.lock().await;
            {
                let mut router = lock(&self.router);
                router.ensure_open()?;
                // Register the sink first so nothing published right after the
                // SUBACK is missed.
                router
                    .sinks
                    .entry(topic.to_string())
                    .or_default()
                    .push(sink);
                router
                    .queued_subscribes
                    .push_back((topic.to_string(), waiter));
            }
            if let Err(e) = self.client.subscribe(topic, self.qos).await {
                let mut router = lock(&self.router);
                router.queued_subscribes.pop_back();
                router.sinks.remove(topic);
                return Err(BusError::Client(e.to_string()));
            }
        }
        ack.await.unwrap_or(Err(BusError::Disconnected))
    }
}

// ── Event loop ────────────────────────────────────────────────────────────────

async fn wait_for_connack(event_loop: &mut EventLoop) -> anyhow::Result<()> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = event_loop.poll().await? {
            if ack.code != ConnectReturnCode::Success {
                bail!("broker refused connection: {:?}", ack.code);
            }
            return Ok(());
        }
    }
}

async fn drive_event_loop(mut event_loop: EventLoop, router: Arc<Mutex<Router>>) {
    loop {
        let event = match event_loop.poll().await {
            Ok(event) => event,
            Err(e) => {
                error!("MQTT connection lost: {e}");
                lock(&router).close();
                return;
            }
        };

        match event {
            Event::Incoming(Packet::Publish(publish)) => {
                let sinks = lock(&router).sinks_for(&publish.topic);
                if sinks.is_empty() {
                    debug!("message on unsubscribed topic {}", publish.topic);
                }
                for sink in sinks {
                    let delivery = Delivery {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if sink.send(delivery).await.is_err() {
                        debug!("subscriber for {} has gone away", publish.topic);
                    }
                }
            }
            Event::Incoming(Packet::PubAck(ack)) => lock(&router).on_puback(ack.pkid),
            Event::Incoming(Packet::SubAck(ack)) => {
                lock(&router).on_suback(ack.pkid, &ack.return_codes)
            }
            Event::Outgoing(Outgoing::Publish(pkid)) => lock(&router).on_outgoing_publish(pkid),
            Event::Outgoing(Outgoing::Subscribe(pkid)) => {
                lock(&router).on_outgoing_subscribe(pkid)
            }
            other => trace!("MQTT event {other:?}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
