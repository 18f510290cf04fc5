//! Integration tests for the vnats-core topic scheme.
//!
//! These tests exercise the codec and the topic functions together through
//! the public API, checking the properties other nodes depend on: topic names
//! are stable, never collide, and follow the exact wire format.

use std::collections::HashSet;

use vnats_core::{broadcast_topic, unicast_topic, MacAddr, Topic, VlanId};

/// Builds a header-only frame addressed to `dst`.
fn frame_to(dst: MacAddr) -> Vec<u8> {
    let mut f = dst.octets().to_vec();
    f.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x09]);
    f.extend_from_slice(&[0x86, 0xDD]);
    f
}

#[test]
fn test_unicast_topics_are_injective_over_vlan_and_address() {
    // Arrange: a grid of VLANs and addresses chosen so that a naive
    // variable-width encoding would collide (e.g. vlan 1 + "1…" vs vlan 11).
    let vlans = [0u32, 1, 11, 111, 4094, u32::MAX];
    let addrs = [
        MacAddr::new([0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
        MacAddr::new([0x10, 0x00, 0x00, 0x00, 0x00, 0x00]),
        MacAddr::new([0x01, 0x00, 0x00, 0x00, 0x00, 0x00]),
        MacAddr::new([0x11, 0x11, 0x11, 0x11, 0x11, 0x11]),
        MacAddr::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
        MacAddr::BROADCAST,
    ];

    // Act
    let mut seen = HashSet::new();
    for &v in &vlans {
        for a in &addrs {
            let topic = unicast_topic(VlanId(v), a);
            // Assert: every pair yields a fresh topic string
            assert!(seen.insert(topic.clone()), "collision on {topic}");
        }
    }

    // Broadcast topics never coincide with any unicast topic either.
    for &v in &vlans {
        assert!(seen.insert(broadcast_topic(VlanId(v))));
    }
}

#[test]
fn test_topics_are_stable_across_calls() {
    let addr: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
    let first = unicast_topic(VlanId(7), &addr);
    for _ in 0..10 {
        assert_eq!(unicast_topic(VlanId(7), &addr), first);
    }
}

#[test]
fn test_broadcast_frame_on_vlan_7_maps_to_vlan_7() {
    // Scenario: VLAN 7, destination ff:ff:ff:ff:ff:ff
    let f = frame_to(MacAddr::BROADCAST);
    let topic = Topic::for_frame(VlanId(7), &f).expect("valid frame");
    assert_eq!(topic.to_string(), "vlan.7");
}

#[test]
fn test_own_unicast_topic_on_vlan_7() {
    // Scenario: VLAN 7, own address aa:bb:cc:dd:ee:ff
    let own: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
    assert_eq!(unicast_topic(VlanId(7), &own), "vlan.7.aabbccddeeff");
}

#[test]
fn test_frame_topic_agrees_with_receiver_subscription() {
    // A frame sent by node A to node B must land on the topic B subscribes to.
    let b: MacAddr = "02:00:00:00:00:0b".parse().unwrap();
    let vlan = VlanId(42);

    let sender_side = Topic::for_frame(vlan, &frame_to(b)).unwrap().to_string();
    let receiver_side = unicast_topic(vlan, &b);

    assert_eq!(sender_side, receiver_side);
}
