//! A network abstraction layer for the telemetry agent
//!
//! This module provides the traits a platform implements to give the agent a
//! byte-stream transport, together with the adapter and protocol code layered
//! on top of them. Everything here is blocking: the agent runs on a single
//! thread of control and the only suspension point lives in the telemetry loop.
//!

#![deny(unsafe_code)]

use core::net::{IpAddr, SocketAddr};

/// Common error types for network operations
pub mod error;

/// Immutable broker addresses
pub mod endpoint;

/// The transport adapter driven by the session layer
pub mod transport;

/// The wireless network-join collaborator
pub mod wifi;

/// Application layer protocol framing
pub mod application;

pub use endpoint::NetworkEndpoint;
pub use transport::{LinkState, Transport, TransportAdapter};

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, NetworkStack, Read, Write};
    pub use super::transport::Transport;
}

/// Byte-oriented read side of a socket.
pub trait Read {
    /// Associated error type. Converting into [`error::Error`] lets the
    /// transport report timeouts and peer closes as such.
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Read data from the connection, returning the number of bytes received.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte-oriented write side of a socket.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug + Into<error::Error>;
    /// Write data to the connection, returning the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Releases a socket. Consuming `self` makes a double close unrepresentable.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A socket that has been opened on a network and can be connected to a peer.
pub trait Connect {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Perform the connect handshake with `remote`.
    fn connect(&mut self, remote: SocketAddr) -> Result<(), Self::Error>;
}

/// An active network context: an interface that has joined a network and can
/// resolve names and hand out stream sockets bound to itself.
///
/// The context is shared and outlives every adapter that borrows it, so its
/// operations take `&self`. Drivers that need mutation keep their state behind
/// interior mutability, the same way a C driver hands out a shared interface
/// pointer.
pub trait NetworkStack {
    /// Socket type produced by [`open`](NetworkStack::open)
    type Socket: Connection + Connect;
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Resolve `host` to an address. `Ok(None)` means the name exists but
    /// has no usable address.
    fn resolve(&self, host: &str) -> Result<Option<IpAddr>, Self::Error>;

    /// Allocate a new stream socket on this network.
    fn open(&self) -> Result<Self::Socket, Self::Error>;
}
