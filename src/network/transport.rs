//! The transport adapter: a byte-stream socket driven by the session layer.
//!
//! [`TransportAdapter`] borrows a [`NetworkStack`] and owns at most one socket
//! from it. The session layer sees it only through the [`Transport`] trait, so
//! tests can substitute a scripted transport.
//!
//! ```text
//!            open()              connect(endpoint)
//!  Closed ───────────▶ Open ─────────────────────▶ Connected
//!     ▲                 │                              │
//!     └─────────────────┴──────── disconnect() ────────┘
//! ```
//!
//! `read` and `write` are deliberately thin: no buffering, no retry on short
//! writes. Completing a frame is the caller's job. Socket timeouts and peer
//! closes come through as [`Error::Timeout`] and [`Error::ConnectionClosed`];
//! any other socket failure becomes `ReadError` or `WriteError`.

use core::net::SocketAddr;

use log::{debug, info, warn};

use super::error::Error;
use super::{Close, Connect, NetworkEndpoint, NetworkStack, Read, Write};

/// Lifecycle of the socket owned by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No socket is allocated.
    Closed,
    /// A socket is allocated on the network but not connected to a peer.
    Open,
    /// The socket is connected; reads and writes are valid.
    Connected,
}

/// The capability set the session layer needs from a byte-stream transport.
pub trait Transport {
    /// Resolve `endpoint` and connect a socket to it.
    fn connect(&mut self, endpoint: &NetworkEndpoint) -> Result<(), Error>;

    /// Receive up to `buf.len()` bytes. May return fewer.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Send up to `buf.len()` bytes. May accept fewer.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error>;

    /// Release the socket. Calling this on a closed transport succeeds.
    fn disconnect(&mut self) -> Result<(), Error>;

    /// Current socket state.
    fn state(&self) -> LinkState;
}

/// A [`Transport`] over sockets handed out by a shared [`NetworkStack`].
pub struct TransportAdapter<'n, N: NetworkStack> {
    network: &'n N,
    socket: Option<N::Socket>,
    state: LinkState,
}

impl<'n, N: NetworkStack> TransportAdapter<'n, N> {
    /// Create a closed adapter on `network`.
    pub fn new(network: &'n N) -> Self {
        Self {
            network,
            socket: None,
            state: LinkState::Closed,
        }
    }

    /// Allocate a socket on the network without connecting it.
    ///
    /// Does nothing if a socket is already allocated.
    pub fn open(&mut self) -> Result<(), Error> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = self.network.open().map_err(|e| {
            warn!("socket open failed: {:?}", e);
            Error::ConnectFailed
        })?;
        self.socket = Some(socket);
        self.state = LinkState::Open;
        Ok(())
    }

    /// Drop the socket after a failed connect so no half-open state remains.
    fn release(&mut self) {
        if let Some(socket) = self.socket.take() {
            if let Err(e) = socket.close() {
                debug!("close after failed connect: {:?}", e);
            }
        }
        self.state = LinkState::Closed;
    }
}

impl<N: NetworkStack> Transport for TransportAdapter<'_, N> {
    fn connect(&mut self, endpoint: &NetworkEndpoint) -> Result<(), Error> {
        // already connected to some peer
        if self.state == LinkState::Connected {
            return Err(Error::ConnectFailed);
        }

        let address = match self.network.resolve(endpoint.host()) {
            Ok(Some(address)) => address,
            Ok(None) => {
                warn!("{} has no address", endpoint.host());
                return Err(Error::ResolutionFailed);
            }
            Err(e) => {
                warn!("resolving {} failed: {:?}", endpoint.host(), e);
                return Err(Error::ResolutionFailed);
            }
        };
        info!("IP address of {} is {}", endpoint.host(), address);

        self.open()?;
        let remote = SocketAddr::new(address, endpoint.port());
        let connected = match self.socket.as_mut() {
            Some(socket) => socket.connect(remote),
            None => return Err(Error::NotOpen),
        };

        match connected {
            Ok(()) => {
                self.state = LinkState::Connected;
                Ok(())
            }
            Err(e) => {
                warn!("connect to {} failed: {:?}", remote, e);
                self.release();
                Err(Error::ConnectFailed)
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.state != LinkState::Connected {
            return Err(Error::NotOpen);
        }
        let socket = self.socket.as_mut().ok_or(Error::NotOpen)?;
        socket.read(buf).map_err(|e| {
            let e: Error = e.into();
            debug!("socket read: {:?}", e);
            passthrough(e, Error::ReadError)
        })
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if self.state != LinkState::Connected {
            return Err(Error::NotOpen);
        }
        let socket = self.socket.as_mut().ok_or(Error::NotOpen)?;
        let written = socket.write(buf).map_err(|e| {
            let e: Error = e.into();
            debug!("socket write: {:?}", e);
            passthrough(e, Error::WriteError)
        })?;
        // the bytes are already accepted; a broken link shows on the next write
        if let Err(e) = socket.flush() {
            let e: Error = e.into();
            debug!("socket flush: {:?}", e);
        }
        Ok(written)
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        self.state = LinkState::Closed;
        match self.socket.take() {
            Some(socket) => socket.close().map_err(|e| {
                warn!("socket close: {:?}", e);
                Error::ConnectionClosed
            }),
            None => Ok(()),
        }
    }

    fn state(&self) -> LinkState {
        self.state
    }
}

/// Keep the errors the session layer can act on, fold the rest into `other`.
fn passthrough(error: Error, other: Error) -> Error {
    match error {
        Error::Timeout | Error::ConnectionClosed => error,
        _ => other,
    }
}

impl<N: NetworkStack> Drop for TransportAdapter<'_, N> {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _ = socket.close();
        }
    }
}

impl<N: NetworkStack> core::fmt::Debug for TransportAdapter<'_, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransportAdapter")
            .field("state", &self.state)
            .finish()
    }
}
