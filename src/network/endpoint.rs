//! Broker endpoint addressing.

use core::fmt;
use heapless::String;

/// Maximum length of a host name held by an endpoint.
pub const MAX_HOST_LEN: usize = 64;

/// A broker address: host name plus TCP port.
///
/// Endpoints are immutable once built; the host is resolved to a concrete
/// address by the network stack at connect time, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEndpoint {
    host: String<MAX_HOST_LEN>,
    port: u16,
}

impl NetworkEndpoint {
    /// Build an endpoint. Returns `None` if `host` is empty or longer than
    /// [`MAX_HOST_LEN`].
    pub fn new(host: &str, port: u16) -> Option<Self> {
        if host.is_empty() {
            return None;
        }
        let host = String::try_from(host).ok()?;
        Some(Self { host, port })
    }

    /// The host name as given, before resolution.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for NetworkEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_host() {
        assert!(NetworkEndpoint::new("", 1883).is_none());
    }

    #[test]
    fn rejects_overlong_host() {
        let host = [b'a'; MAX_HOST_LEN + 1];
        let host = core::str::from_utf8(&host).unwrap();
        assert!(NetworkEndpoint::new(host, 1883).is_none());
    }

    #[test]
    fn keeps_host_and_port() {
        let endpoint = NetworkEndpoint::new("demo.thingsboard.io", 1883).unwrap();
        assert_eq!(endpoint.host(), "demo.thingsboard.io");
        assert_eq!(endpoint.port(), 1883);
    }
}
