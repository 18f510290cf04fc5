//! Infrastructure layer for vnats-bridge.
//!
//! Contains the I/O-facing adapters behind the application ports.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `vnats_core`, but MUST NOT be imported by the `application` or `domain`
//! layers.
//!
//! # Sub-modules
//!
//! - **`tap`** – Linux TAP device implementing `FrameTransport`.  Only
//!   compiled on Linux.
//!
//! - **`mqtt`** – MQTT client implementing `BusClient`, including the
//!   background event loop that pairs acknowledgments with callers.
//!
//! - **`config_file`** – The optional TOML configuration file.
//!
//! - **`memory`** – In-memory `FrameTransport` and `BusClient` used by tests.

pub mod config_file;
pub mod memory;
pub mod mqtt;

#[cfg(target_os = "linux")]
pub mod tap;
