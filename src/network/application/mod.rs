//! # Application Layer Network Protocols
//!
//! Protocol framing layered on top of the [`Transport`](crate::network::Transport)
//! abstraction. Framing code never touches a socket: it produces and parses
//! fixed-capacity buffers, and the session layer moves them across the wire.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 publisher subset (connect, QoS 0 publish, disconnect)
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: nothing here knows what carries the bytes
//! - **No-std Compatible**: no heap allocation, `heapless` buffers only
//! - **Size Checked Up Front**: a packet that cannot fit is rejected before
//!   anything is written

/// MQTT 3.1.1 publisher framing.
pub mod mqtt;
