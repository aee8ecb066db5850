//! The publish session: MQTT over a [`Transport`].
//!
//! A [`Session`] owns its transport and moves through three states:
//!
//! ```text
//!                 connect() ok
//!  Disconnected ───────────────▶ Established
//!       ▲   │                         │
//!       │   └─ Handshaking (inside    │ disconnect()
//!       │      connect() only)        │
//!       └─────────────────────────────┘
//! ```
//!
//! `Handshaking` exists only while [`Session::connect`] runs; callers never
//! observe it. Any failure during connect tears the transport down and leaves
//! the session `Disconnected`.
//!
//! A failed publish does not change state. Whether a run of failures means
//! the link is dead is the caller's decision.

use core::fmt;

use heapless::String;
use log::{debug, info, warn};

use crate::network::application::mqtt::{
    self, CONNACK_LEN, ConnackError, ConnectOptions, ConnectReturnCode, DISCONNECT_FRAME,
    FrameError, MAX_CLIENT_ID_LEN, MAX_PASSWORD_LEN, MAX_USERNAME_LEN,
};
use crate::network::error::Error as NetError;
use crate::network::{LinkState, NetworkEndpoint, Transport};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No broker session. Publishing fails without touching the transport.
    Disconnected,
    /// `CONNECT` sent, waiting for `CONNACK`.
    Handshaking,
    /// The broker accepted the session.
    Established,
}

/// Why the `CONNECT`/`CONNACK` exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    /// The broker rejected the connection.
    Refused(ConnectReturnCode),
    /// The broker answered with something that is not a valid `CONNACK`.
    Malformed,
    /// The transport failed or timed out mid-handshake.
    Transport(NetError),
    /// The `CONNECT` packet could not be built from the credentials.
    Encoding(FrameError),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused(code) => write!(f, "refused: {code}"),
            Self::Malformed => write!(f, "malformed CONNACK"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Encoding(e) => write!(f, "encoding: {e}"),
        }
    }
}

/// Session-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The broker host name did not resolve.
    ResolutionFailed,
    /// The socket could not be connected.
    TransportConnectFailed,
    /// The protocol handshake was rejected or did not complete.
    HandshakeFailed(HandshakeError),
    /// Publish attempted without an established session.
    NotEstablished,
    /// Connect attempted while a session or socket is already up.
    InvalidState,
    /// Topic or payload does not fit a frame.
    PayloadTooLarge,
    /// Topic is empty or contains wildcards.
    InvalidTopic,
    /// The transport failed while sending a `PUBLISH`.
    PublishFailed(NetError),
    /// The transport could not release its socket. The session is
    /// disconnected regardless.
    TransportCloseFailed(NetError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ResolutionFailed => write!(f, "broker host name did not resolve"),
            Error::TransportConnectFailed => write!(f, "transport connect failed"),
            Error::HandshakeFailed(e) => write!(f, "handshake failed: {e}"),
            Error::NotEstablished => write!(f, "session not established"),
            Error::InvalidState => write!(f, "session already connected"),
            Error::PayloadTooLarge => write!(f, "message exceeds frame capacity"),
            Error::InvalidTopic => write!(f, "invalid topic"),
            Error::PublishFailed(e) => write!(f, "publish failed: {e}"),
            Error::TransportCloseFailed(e) => write!(f, "transport close failed: {e}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::ResolutionFailed => defmt::write!(f, "ResolutionFailed"),
            Error::TransportConnectFailed => defmt::write!(f, "TransportConnectFailed"),
            Error::HandshakeFailed(_) => defmt::write!(f, "HandshakeFailed"),
            Error::NotEstablished => defmt::write!(f, "NotEstablished"),
            Error::InvalidState => defmt::write!(f, "InvalidState"),
            Error::PayloadTooLarge => defmt::write!(f, "PayloadTooLarge"),
            Error::InvalidTopic => defmt::write!(f, "InvalidTopic"),
            Error::PublishFailed(e) => defmt::write!(f, "PublishFailed({})", e),
            Error::TransportCloseFailed(e) => defmt::write!(f, "TransportCloseFailed({})", e),
        }
    }
}

/// Identity presented to the broker in `CONNECT`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    client_id: String<MAX_CLIENT_ID_LEN>,
    username: Option<String<MAX_USERNAME_LEN>>,
    password: Option<String<MAX_PASSWORD_LEN>>,
}

impl Credentials {
    /// Credentials with only a client id. Returns `None` if it is too long.
    pub fn new(client_id: &str) -> Option<Self> {
        Some(Self {
            client_id: String::try_from(client_id).ok()?,
            username: None,
            password: None,
        })
    }

    /// Set the username (device access token).
    pub fn with_username(mut self, username: &str) -> Option<Self> {
        self.username = Some(String::try_from(username).ok()?);
        Some(self)
    }

    /// Set the password.
    pub fn with_password(mut self, password: &str) -> Option<Self> {
        self.password = Some(String::try_from(password).ok()?);
        Some(self)
    }

    /// The client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The username, if any.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn connect_options(&self, keep_alive_seconds: u16) -> ConnectOptions<'_> {
        ConnectOptions {
            client_id: &self.client_id,
            username: self.username.as_deref(),
            password: self.password.as_deref().map(str::as_bytes),
            keep_alive_seconds,
            clean_session: true,
        }
    }
}

/// An MQTT publish session over a transport it owns.
pub struct Session<T: Transport> {
    transport: T,
    state: SessionState,
    keep_alive_seconds: u16,
    credentials: Option<Credentials>,
}

impl<T: Transport> Session<T> {
    /// Wrap `transport` in a disconnected session.
    pub fn new(transport: T, keep_alive_seconds: u16) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
            keep_alive_seconds,
            credentials: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `true` when publishing is allowed.
    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Credentials of the last successful connect.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Open the transport to `endpoint` and perform the MQTT handshake.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] - the session or the transport is already connected
    /// * [`Error::ResolutionFailed`] - the host did not resolve
    /// * [`Error::TransportConnectFailed`] - the socket did not connect
    /// * [`Error::HandshakeFailed`] - the broker refused or never acknowledged
    ///
    /// On any error the transport is torn down and the session stays
    /// [`SessionState::Disconnected`].
    pub fn connect(
        &mut self,
        endpoint: &NetworkEndpoint,
        credentials: &Credentials,
    ) -> Result<(), Error> {
        if self.state != SessionState::Disconnected
            || self.transport.state() == LinkState::Connected
        {
            return Err(Error::InvalidState);
        }

        if let Err(e) = self.transport.connect(endpoint) {
            self.abort();
            return Err(match e {
                NetError::ResolutionFailed => Error::ResolutionFailed,
                _ => Error::TransportConnectFailed,
            });
        }

        self.state = SessionState::Handshaking;
        match self.handshake(credentials) {
            Ok(()) => {
                self.state = SessionState::Established;
                self.credentials = Some(credentials.clone());
                info!("session established with {}", endpoint);
                Ok(())
            }
            Err(e) => {
                warn!("handshake with {} failed: {}", endpoint, e);
                self.abort();
                Err(Error::HandshakeFailed(e))
            }
        }
    }

    fn handshake(&mut self, credentials: &Credentials) -> Result<(), HandshakeError> {
        let frame = mqtt::encode_connect(&credentials.connect_options(self.keep_alive_seconds))
            .map_err(HandshakeError::Encoding)?;
        self.write_all(&frame).map_err(HandshakeError::Transport)?;

        let mut connack = [0u8; CONNACK_LEN];
        self.read_exact(&mut connack)
            .map_err(HandshakeError::Transport)?;

        mqtt::decode_connack(&connack).map_err(|e| match e {
            ConnackError::Malformed => HandshakeError::Malformed,
            ConnackError::Refused(code) => HandshakeError::Refused(code),
        })
    }

    /// Publish `payload` to `topic` at QoS 0.
    ///
    /// # Errors
    ///
    /// * [`Error::NotEstablished`] - no session; nothing is written
    /// * [`Error::PayloadTooLarge`] / [`Error::InvalidTopic`] - rejected before any write
    /// * [`Error::PublishFailed`] - the transport failed; the session stays established
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        if self.state != SessionState::Established {
            return Err(Error::NotEstablished);
        }

        let frame = mqtt::encode_publish(topic, payload).map_err(|e| match e {
            FrameError::InvalidTopic => Error::InvalidTopic,
            FrameError::TooLarge | FrameError::InvalidOptions => Error::PayloadTooLarge,
        })?;

        self.write_all(&frame).map_err(Error::PublishFailed)?;
        debug!("published {} bytes to {}", payload.len(), topic);
        Ok(())
    }

    /// Send `DISCONNECT` (best effort) and release the transport.
    ///
    /// Safe to call repeatedly; only the first call after a connect sends
    /// anything. The session ends up [`SessionState::Disconnected`] even when
    /// the transport reports [`Error::TransportCloseFailed`].
    pub fn disconnect(&mut self) -> Result<(), Error> {
        if self.state == SessionState::Established {
            if let Err(e) = self.write_all(&DISCONNECT_FRAME) {
                debug!("DISCONNECT not delivered: {}", e);
            }
        }
        self.state = SessionState::Disconnected;
        self.transport
            .disconnect()
            .map_err(Error::TransportCloseFailed)
    }

    fn abort(&mut self) {
        self.state = SessionState::Disconnected;
        if let Err(e) = self.transport.disconnect() {
            debug!("transport teardown: {}", e);
        }
    }

    /// Push every byte of `bytes`, looping over short writes.
    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), NetError> {
        while !bytes.is_empty() {
            match self.transport.write(bytes)? {
                0 => return Err(NetError::WriteError),
                n => bytes = &bytes[n..],
            }
        }
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), NetError> {
        let mut total_read = 0;
        while total_read < buf.len() {
            match self.transport.read(&mut buf[total_read..])? {
                0 => return Err(NetError::ConnectionClosed),
                n => total_read += n,
            }
        }
        Ok(())
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("keep_alive_seconds", &self.keep_alive_seconds)
            .finish()
    }
}
