//! vnats-bridge library crate.
//!
//! This crate bridges a local TAP interface onto a publish/subscribe bus so
//! that every node attached to the same bus and VLAN shares one Ethernet
//! segment.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! TAP interface (raw Ethernet frames)
//!         ↕
//! [vnats-bridge]
//!   ├── domain/           Pure types: BridgeConfig, BridgeState
//!   ├── application/      BridgeEngine + the FrameTransport / BusClient ports
//!   └── infrastructure/
//!         ├── tap/        Linux TAP device (tun crate)
//!         ├── mqtt/       MQTT bus client (rumqttc)
//!         ├── config_file/ TOML configuration file
//!         └── memory/     In-memory transport and bus for tests
//!         ↕
//! MQTT broker (topics vlan.<id> and vlan.<id>.<mac>)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `vnats-core`, and the two port traits
//!   it defines; it never names a concrete device or bus.
//! - `infrastructure` implements the ports with real (or in-memory) I/O.

/// Domain layer: configuration and lifecycle state (no I/O).
pub mod domain;

/// Application layer: the bridge engine and its ports.
pub mod application;

/// Infrastructure layer: TAP device, MQTT client, config file, test doubles.
pub mod infrastructure;
