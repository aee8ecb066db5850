//! MQTT 3.1.1 packet encoding for the subset the agent speaks.
//!
//! The agent only ever sends `CONNECT`, `PUBLISH` (QoS 0) and `DISCONNECT`,
//! and only ever parses `CONNACK`. Everything is encoded into fixed-capacity
//! [`heapless::Vec`] frames so a whole packet can be checked for size before
//! the first byte reaches the transport.

use core::fmt;
use heapless::Vec;

// MQTT Control Packet types - these are the fixed header packet type values
/// MQTT CONNECT packet type identifier.
pub const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
pub const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier.
pub const PUBLISH: u8 = 0x30;
/// MQTT DISCONNECT packet type identifier.
pub const DISCONNECT: u8 = 0xE0;

// Protocol constants defined by MQTT 3.1.1 specification
/// MQTT protocol name as defined in the specification.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_CLEAN_SESSION: u8 = 0x02;

/// Longest client identifier a 3.1.1 broker must accept.
pub const MAX_CLIENT_ID_LEN: usize = 23;
/// Longest username (access token) carried in `CONNECT`.
pub const MAX_USERNAME_LEN: usize = 128;
/// Longest password carried in `CONNECT`.
pub const MAX_PASSWORD_LEN: usize = 64;
/// Longest topic name accepted for `PUBLISH`.
pub const MAX_TOPIC_LEN: usize = 128;
/// Largest payload accepted for `PUBLISH`.
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Capacity of an encoded `CONNECT` packet.
pub const CONNECT_FRAME_CAPACITY: usize = 256;
/// Capacity of an encoded `PUBLISH` packet: fixed header, topic, payload.
pub const PUBLISH_FRAME_CAPACITY: usize = 5 + 2 + MAX_TOPIC_LEN + MAX_PAYLOAD_LEN;

/// An encoded `CONNECT` packet.
pub type ConnectFrame = Vec<u8, CONNECT_FRAME_CAPACITY>;
/// An encoded `PUBLISH` packet.
pub type PublishFrame = Vec<u8, PUBLISH_FRAME_CAPACITY>;

/// The encoded `DISCONNECT` packet. It has no variable part.
pub const DISCONNECT_FRAME: [u8; 2] = [DISCONNECT, 0x00];

/// Length of a `CONNACK` packet on the wire.
pub const CONNACK_LEN: usize = 4;

/// Parameters of the `CONNECT` handshake.
#[derive(Debug, Clone)]
pub struct ConnectOptions<'a> {
    /// The client identifier. May be empty when `clean_session` is set.
    pub client_id: &'a str,
    /// Username field; brokers such as ThingsBoard put the device access
    /// token here.
    pub username: Option<&'a str>,
    /// Password field. Only sent together with a username.
    pub password: Option<&'a [u8]>,
    /// The keep-alive time interval in seconds. Zero disables keep-alive.
    pub keep_alive_seconds: u16,
    /// Whether the broker should discard previous session state.
    pub clean_session: bool,
}

/// Why a packet could not be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// A field or the whole packet exceeds its fixed capacity.
    TooLarge,
    /// Topic is empty or contains a wildcard.
    InvalidTopic,
    /// Empty client id without a clean session, or password without username.
    InvalidOptions,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooLarge => write!(f, "packet exceeds frame capacity"),
            FrameError::InvalidTopic => write!(f, "invalid topic name"),
            FrameError::InvalidOptions => write!(f, "invalid connect options"),
        }
    }
}

/// `CONNACK` return codes (MQTT 3.1.1 §3.2.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectReturnCode {
    /// The connection was accepted.
    Accepted = 0,
    /// The broker does not support protocol level 4.
    UnacceptableProtocolVersion = 1,
    /// The client identifier was rejected.
    IdentifierRejected = 2,
    /// The broker is unavailable.
    ServerUnavailable = 3,
    /// The username or password is malformed.
    BadUserNameOrPassword = 4,
    /// The client is not authorized to connect.
    NotAuthorized = 5,
}

impl ConnectReturnCode {
    fn from_byte(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Accepted),
            1 => Some(Self::UnacceptableProtocolVersion),
            2 => Some(Self::IdentifierRejected),
            3 => Some(Self::ServerUnavailable),
            4 => Some(Self::BadUserNameOrPassword),
            5 => Some(Self::NotAuthorized),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::UnacceptableProtocolVersion => write!(f, "unacceptable protocol version"),
            Self::IdentifierRejected => write!(f, "identifier rejected"),
            Self::ServerUnavailable => write!(f, "server unavailable"),
            Self::BadUserNameOrPassword => write!(f, "bad user name or password"),
            Self::NotAuthorized => write!(f, "not authorized"),
        }
    }
}

/// Outcome of parsing a `CONNACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnackError {
    /// Wrong packet type, wrong remaining length or unknown return code.
    Malformed,
    /// The broker answered with a non-zero return code.
    Refused(ConnectReturnCode),
}

fn push_slice<const N: usize>(buf: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), FrameError> {
    buf.extend_from_slice(bytes).map_err(|_| FrameError::TooLarge)
}

fn push_prefixed<const N: usize>(buf: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), FrameError> {
    let len = u16::try_from(bytes.len()).map_err(|_| FrameError::TooLarge)?;
    push_slice(buf, &len.to_be_bytes())?;
    push_slice(buf, bytes)
}

/// Encode the remaining length field for an MQTT packet.
///
/// Each byte carries 7 bits of the length, least significant group first; the
/// high bit marks a continuation. At most four bytes, so lengths up to
/// 268,435,455 are representable.
fn encode_remaining_length<const N: usize>(
    buf: &mut Vec<u8, N>,
    mut len: usize,
) -> Result<(), FrameError> {
    for _ in 0..4 {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| FrameError::TooLarge)?;
        if len == 0 {
            return Ok(());
        }
    }
    Err(FrameError::TooLarge)
}

/// Encode a `CONNECT` packet.
pub fn encode_connect(options: &ConnectOptions<'_>) -> Result<ConnectFrame, FrameError> {
    if options.client_id.len() > MAX_CLIENT_ID_LEN {
        return Err(FrameError::TooLarge);
    }
    if options.client_id.is_empty() && !options.clean_session {
        return Err(FrameError::InvalidOptions);
    }
    if options.password.is_some() && options.username.is_none() {
        return Err(FrameError::InvalidOptions);
    }
    if options.username.is_some_and(|u| u.len() > MAX_USERNAME_LEN)
        || options.password.is_some_and(|p| p.len() > MAX_PASSWORD_LEN)
    {
        return Err(FrameError::TooLarge);
    }

    // --- Variable Header ---
    let mut body: ConnectFrame = Vec::new();
    push_prefixed(&mut body, PROTOCOL_NAME)?;
    let mut connect_flags = 0;
    if options.clean_session {
        connect_flags |= FLAG_CLEAN_SESSION;
    }
    if options.username.is_some() {
        connect_flags |= FLAG_USERNAME;
    }
    if options.password.is_some() {
        connect_flags |= FLAG_PASSWORD;
    }
    push_slice(&mut body, &[PROTOCOL_LEVEL, connect_flags])?;
    push_slice(&mut body, &options.keep_alive_seconds.to_be_bytes())?;

    // --- Payload ---
    push_prefixed(&mut body, options.client_id.as_bytes())?;
    if let Some(username) = options.username {
        push_prefixed(&mut body, username.as_bytes())?;
    }
    if let Some(password) = options.password {
        push_prefixed(&mut body, password)?;
    }

    // --- Fixed Header ---
    let mut frame: ConnectFrame = Vec::new();
    frame.push(CONNECT).map_err(|_| FrameError::TooLarge)?;
    encode_remaining_length(&mut frame, body.len())?;
    push_slice(&mut frame, &body)?;
    Ok(frame)
}

/// Parse a `CONNACK` packet.
pub fn decode_connack(packet: &[u8; CONNACK_LEN]) -> Result<(), ConnackError> {
    if packet[0] != CONNACK || packet[1] != 2 {
        return Err(ConnackError::Malformed);
    }
    // only the session-present bit may be set
    if packet[2] & !0x01 != 0 {
        return Err(ConnackError::Malformed);
    }
    match ConnectReturnCode::from_byte(packet[3]) {
        Some(ConnectReturnCode::Accepted) => Ok(()),
        Some(code) => Err(ConnackError::Refused(code)),
        None => Err(ConnackError::Malformed),
    }
}

/// Check a topic name for `PUBLISH`: non-empty, bounded, no wildcards.
pub fn validate_topic(topic: &str) -> Result<(), FrameError> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(FrameError::InvalidTopic);
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(FrameError::TooLarge);
    }
    Ok(())
}

/// Encode a QoS 0 `PUBLISH` packet. QoS 0 carries no packet identifier.
pub fn encode_publish(topic: &str, payload: &[u8]) -> Result<PublishFrame, FrameError> {
    validate_topic(topic)?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::TooLarge);
    }

    let remaining_len = 2 + topic.len() + payload.len();
    let mut frame: PublishFrame = Vec::new();
    frame.push(PUBLISH).map_err(|_| FrameError::TooLarge)?;
    encode_remaining_length(&mut frame, remaining_len)?;
    push_prefixed(&mut frame, topic.as_bytes())?;
    push_slice(&mut frame, payload)?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remaining_length(len: usize) -> Vec<u8, 5> {
        let mut buf = Vec::new();
        encode_remaining_length(&mut buf, len).unwrap();
        buf
    }

    #[test]
    fn remaining_length_boundaries() {
        assert_eq!(&remaining_length(0)[..], &[0x00]);
        assert_eq!(&remaining_length(127)[..], &[0x7F]);
        assert_eq!(&remaining_length(128)[..], &[0x80, 0x01]);
        assert_eq!(&remaining_length(16_383)[..], &[0xFF, 0x7F]);
        assert_eq!(&remaining_length(16_384)[..], &[0x80, 0x80, 0x01]);
    }

    #[test]
    fn remaining_length_rejects_five_byte_values() {
        let mut buf: Vec<u8, 8> = Vec::new();
        assert_eq!(
            encode_remaining_length(&mut buf, 268_435_456),
            Err(FrameError::TooLarge)
        );
    }

    #[test]
    fn connect_carries_access_token_as_username() {
        let frame = encode_connect(&ConnectOptions {
            client_id: "",
            username: Some("token"),
            password: None,
            keep_alive_seconds: 60,
            clean_session: true,
        })
        .unwrap();

        let expected: &[u8] = &[
            CONNECT, 19, // fixed header
            0, 4, b'M', b'Q', b'T', b'T', 4, 0x82, 0, 60, // variable header
            0, 0, // empty client id
            0, 5, b't', b'o', b'k', b'e', b'n',
        ];
        assert_eq!(&frame[..], expected);
    }

    #[test]
    fn connect_rejects_password_without_username() {
        let result = encode_connect(&ConnectOptions {
            client_id: "dev",
            username: None,
            password: Some(b"secret"),
            keep_alive_seconds: 60,
            clean_session: true,
        });
        assert_eq!(result, Err(FrameError::InvalidOptions));
    }

    #[test]
    fn connack_accepted() {
        assert_eq!(decode_connack(&[CONNACK, 2, 0, 0]), Ok(()));
    }

    #[test]
    fn connack_refused_with_code() {
        assert_eq!(
            decode_connack(&[CONNACK, 2, 0, 5]),
            Err(ConnackError::Refused(ConnectReturnCode::NotAuthorized))
        );
    }

    #[test]
    fn connack_wrong_type_is_malformed() {
        assert_eq!(
            decode_connack(&[PUBLISH, 2, 0, 0]),
            Err(ConnackError::Malformed)
        );
        assert_eq!(
            decode_connack(&[CONNACK, 2, 0, 9]),
            Err(ConnackError::Malformed)
        );
    }

    #[test]
    fn publish_layout() {
        let frame = encode_publish("a/b", b"hi").unwrap();
        assert_eq!(&frame[..], &[PUBLISH, 7, 0, 3, b'a', b'/', b'b', b'h', b'i']);
    }

    #[test]
    fn publish_rejects_wildcards() {
        assert_eq!(encode_publish("a/+", b"x"), Err(FrameError::InvalidTopic));
        assert_eq!(encode_publish("", b"x"), Err(FrameError::InvalidTopic));
    }

    #[test]
    fn publish_rejects_oversized_payload() {
        let payload = [b'x'; MAX_PAYLOAD_LEN + 1];
        assert_eq!(encode_publish("t", &payload), Err(FrameError::TooLarge));
    }

    #[test]
    fn publish_accepts_largest_frame() {
        let topic = [b't'; MAX_TOPIC_LEN];
        let topic = core::str::from_utf8(&topic).unwrap();
        let payload = [b'x'; MAX_PAYLOAD_LEN];
        let frame = encode_publish(topic, &payload).unwrap();
        // 386 bytes of remaining length need two length bytes
        assert_eq!(frame.len(), 1 + 2 + 2 + MAX_TOPIC_LEN + MAX_PAYLOAD_LEN);
    }
}
