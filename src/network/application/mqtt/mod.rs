//! MQTT 3.1.1 framing for the telemetry session.
//!
//! MQTT uses a publish-subscribe pattern where publishers send messages to
//! topics on a broker. The agent is a pure publisher: it opens a session with
//! `CONNECT`, sends readings as QoS 0 `PUBLISH` packets (fire and forget, no
//! acknowledgement), and closes with `DISCONNECT`. Subscriptions, retained
//! messages and QoS 1/2 are not implemented.
//!
//! The [`Session`](crate::session::Session) drives these encoders over a
//! [`Transport`](crate::network::Transport).
//!
//! ```rust
//! use telemetry_agent::network::application::mqtt::{encode_publish, PUBLISH};
//!
//! let frame = encode_publish("v1/devices/me/telemetry", br#"{"Temperature":21.43}"#).unwrap();
//! assert_eq!(frame[0], PUBLISH);
//! ```

/// Packet encoders and the `CONNACK` parser.
pub mod packet;

pub use packet::{
    CONNACK, CONNACK_LEN, CONNECT, ConnackError, ConnectOptions, ConnectReturnCode, DISCONNECT,
    DISCONNECT_FRAME, FrameError, MAX_CLIENT_ID_LEN, MAX_PASSWORD_LEN, MAX_PAYLOAD_LEN,
    MAX_TOPIC_LEN, MAX_USERNAME_LEN, PUBLISH, decode_connack, encode_connect, encode_publish,
    validate_topic,
};
