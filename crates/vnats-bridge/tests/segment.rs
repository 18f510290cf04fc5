//! End-to-end behaviour of bridge engines sharing one in-memory bus.
//!
//! Each engine stands for one host: a `MemoryTransport` plays its TAP
//! interface and a shared `MemoryBus` plays the broker.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use vnats_bridge::application::{BridgeEngine, BridgeError};
use vnats_bridge::domain::{BridgeConfig, BridgeState};
use vnats_bridge::infrastructure::memory::{FrameInjector, MemoryBus, MemoryTransport};
use vnats_core::{MacAddr, VlanId};

const WAIT: Duration = Duration::from_secs(5);

const HOST_A: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x0A]);
const HOST_B: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x0B]);
const HOST_C: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x0C]);

struct Host {
    transport: Arc<MemoryTransport>,
    injector: FrameInjector,
    state: tokio::sync::watch::Receiver<BridgeState>,
    task: JoinHandle<BridgeError>,
}

/// Starts an engine for `address` on `vlan` and waits until it is running.
async fn start_host(bus: &Arc<MemoryBus>, vlan: u32, address: MacAddr) -> Host {
    let (transport, injector) = MemoryTransport::new(address);
    let mut engine = BridgeEngine::new(
        &BridgeConfig::for_vlan(VlanId(vlan)),
        transport.clone(),
        bus.clone(),
    );
    engine.start().await.expect("engine should start");
    let state = engine.watch_state();
    let task = tokio::spawn(async move { engine.run_outbound_pump().await });
    Host {
        transport,
        injector,
        state,
        task,
    }
}

fn frame(dst: MacAddr, src: MacAddr, tag: u8, payload_len: usize) -> Vec<u8> {
    let mut f = dst.octets().to_vec();
    f.extend_from_slice(&src.octets());
    f.extend_from_slice(&[0x08, 0x00]);
    f.extend(std::iter::repeat(tag).take(payload_len));
    f
}

#[tokio::test]
async fn test_unicast_frame_reaches_only_its_destination() {
    // Arrange: three hosts on VLAN 7
    let bus = MemoryBus::new();
    let a = start_host(&bus, 7, HOST_A).await;
    let b = start_host(&bus, 7, HOST_B).await;
    let c = start_host(&bus, 7, HOST_C).await;
    let f = frame(HOST_B, HOST_A, 1, 46);

    // Act: A's interface emits a frame for B
    a.injector.inject(f.clone());
    let written = timeout(WAIT, b.transport.wait_for_writes(1)).await.unwrap();

    // Assert
    assert_eq!(written, vec![f]);
    assert!(a.transport.written().is_empty());
    assert!(c.transport.written().is_empty());
    assert_eq!(
        bus.published(),
        vec![("vlan.7.02000000000b".to_string(), written[0].clone())]
    );
}

#[tokio::test]
async fn test_broadcast_frame_reaches_every_host_on_the_vlan() {
    let bus = MemoryBus::new();
    let a = start_host(&bus, 7, HOST_A).await;
    let b = start_host(&bus, 7, HOST_B).await;
    let c = start_host(&bus, 7, HOST_C).await;
    let f = frame(MacAddr::BROADCAST, HOST_A, 2, 46);

    a.injector.inject(f.clone());

    // Every subscriber of vlan.7 gets it, the sender included
    for host in [&a, &b, &c] {
        let written = timeout(WAIT, host.transport.wait_for_writes(1)).await.unwrap();
        assert_eq!(written, vec![f.clone()]);
    }
}

#[tokio::test]
async fn test_vlans_are_isolated() {
    // Arrange: A on VLAN 7, B on VLAN 8
    let bus = MemoryBus::new();
    let a = start_host(&bus, 7, HOST_A).await;
    let b = start_host(&bus, 8, HOST_B).await;

    // Act: A broadcasts and unicasts to B's address
    a.injector.inject(frame(MacAddr::BROADCAST, HOST_A, 3, 46));
    a.injector.inject(frame(HOST_B, HOST_A, 4, 46));
    let published = timeout(WAIT, bus.wait_for_publishes(2)).await.unwrap();

    // Assert: both went to VLAN 7 topics, B saw nothing
    assert_eq!(published[0].0, "vlan.7");
    assert_eq!(published[1].0, "vlan.7.02000000000b");
    assert!(
        timeout(Duration::from_millis(50), b.transport.wait_for_writes(1))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_round_trip_between_two_hosts() {
    let bus = MemoryBus::new();
    let a = start_host(&bus, 1, HOST_A).await;
    let b = start_host(&bus, 1, HOST_B).await;
    let request = frame(HOST_B, HOST_A, 5, 60);
    let reply = frame(HOST_A, HOST_B, 6, 60);

    a.injector.inject(request.clone());
    let at_b = timeout(WAIT, b.transport.wait_for_writes(1)).await.unwrap();
    b.injector.inject(reply.clone());
    let at_a = timeout(WAIT, a.transport.wait_for_writes(1)).await.unwrap();

    assert_eq!(at_b, vec![request]);
    assert_eq!(at_a, vec![reply]);
}

#[tokio::test]
async fn test_full_size_frame_crosses_intact() {
    let bus = MemoryBus::new();
    let a = start_host(&bus, 7, HOST_A).await;
    let b = start_host(&bus, 7, HOST_B).await;
    let mut f = frame(HOST_B, HOST_A, 0, 0);
    assert_eq!(f.len(), 14);
    f.extend((0..1500).map(|i| (i % 256) as u8));
    assert_eq!(f.len(), 1514);

    a.injector.inject(f.clone());
    let written = timeout(WAIT, b.transport.wait_for_writes(1)).await.unwrap();

    assert_eq!(written, vec![f]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deliveries_are_written_one_at_a_time() {
    // Arrange: one running host and 100 remote senders on both of its topics
    let bus = MemoryBus::new();
    let host = start_host(&bus, 7, HOST_A).await;
    let mut senders = Vec::new();

    // Act
    for i in 0..100u8 {
        let bus = bus.clone();
        senders.push(tokio::spawn(async move {
            let topic = if i % 2 == 0 {
                "vlan.7".to_string()
            } else {
                "vlan.7.02000000000a".to_string()
            };
            bus.deliver(&topic, frame(HOST_A, HOST_B, i, 100)).await
        }));
    }
    for sender in senders {
        assert_eq!(sender.await.unwrap(), 1);
    }
    let written = timeout(WAIT, host.transport.wait_for_writes(100))
        .await
        .unwrap();

    // Assert: no write overlapped another and every frame arrived whole
    assert_eq!(host.transport.overlapping_writes(), 0);
    assert_eq!(written.len(), 100);
    let mut tags: Vec<u8> = written
        .iter()
        .map(|f| {
            assert_eq!(f.len(), 114);
            assert!(f[14..].iter().all(|b| *b == f[14]));
            f[14]
        })
        .collect();
    tags.sort_unstable();
    assert_eq!(tags, (0..100u8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_publish_failure_terminates_only_the_sender() {
    // Arrange
    let bus = MemoryBus::new();
    let mut a = start_host(&bus, 7, HOST_A).await;

    // Act
    bus.set_fail_publish(true);
    a.injector.inject(frame(HOST_B, HOST_A, 7, 46));
    let err = timeout(WAIT, &mut a.task).await.unwrap().unwrap();

    // Assert
    assert!(matches!(err, BridgeError::Publish { .. }));
    assert_eq!(*a.state.borrow_and_update(), BridgeState::Terminated);
}

#[tokio::test]
async fn test_closed_interface_terminates_bridge() {
    let bus = MemoryBus::new();
    let Host {
        injector,
        mut state,
        task,
        ..
    } = start_host(&bus, 7, HOST_A).await;

    drop(injector);
    let err = timeout(WAIT, task).await.unwrap().unwrap();

    assert!(matches!(err, BridgeError::Read(_)));
    assert!(state.borrow_and_update().is_terminal());
}
