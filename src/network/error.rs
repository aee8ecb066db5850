//! Common error types for network operations

use core::fmt;

/// A common error type for network operations.
///
/// This enum defines the errors the transport adapter reports to the session
/// layer. It is designed to be simple and portable for `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// A protocol-specific error occurred.
    ProtocolError,
    /// The host name has no resolvable address.
    ResolutionFailed,
    /// The socket could not be opened or the connect handshake failed.
    ConnectFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotOpen => write!(f, "connection not open"),
            Error::WriteError => write!(f, "write failed"),
            Error::ReadError => write!(f, "read failed"),
            Error::ConnectionRefused => write!(f, "connection refused"),
            Error::Timeout => write!(f, "timed out"),
            Error::ConnectionClosed => write!(f, "connection closed by peer"),
            Error::InvalidAddress => write!(f, "invalid address"),
            Error::ProtocolError => write!(f, "protocol error"),
            Error::ResolutionFailed => write!(f, "host name resolution failed"),
            Error::ConnectFailed => write!(f, "socket connect failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
            Error::ResolutionFailed => defmt::write!(f, "ResolutionFailed"),
            Error::ConnectFailed => defmt::write!(f, "ConnectFailed"),
        }
    }
}
