//! Telemetry messages and their payload text.
//!
//! A reading is published as a flat JSON object with the fields in a fixed
//! order and two decimals each:
//!
//! ```text
//! {"Temperature":21.43, "humidity":38.20, "Pressure":1013.25}
//! ```
//!
//! The key spelling (including the lower-case `humidity`) is what existing
//! dashboards consume, so it is kept verbatim. Unavailable values are left
//! out of the object entirely rather than sent as a sentinel; consumers that
//! read by key see the field as absent for that sample. NaN and infinities
//! have no JSON spelling and count as unavailable.

use core::fmt::{self, Write as _};

use heapless::{String, Vec};
use serde::Deserialize;

use crate::network::application::mqtt::{MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use crate::sensor::SensorReading;

/// Errors while building a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The encoded payload would exceed [`MAX_PAYLOAD_LEN`] bytes.
    PayloadTooLarge,
    /// The topic exceeds [`MAX_TOPIC_LEN`] bytes.
    TopicTooLong,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::PayloadTooLarge => {
                write!(f, "payload longer than {MAX_PAYLOAD_LEN} bytes")
            }
            EncodeError::TopicTooLong => write!(f, "topic longer than {MAX_TOPIC_LEN} bytes"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EncodeError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            EncodeError::PayloadTooLarge => defmt::write!(f, "PayloadTooLarge"),
            EncodeError::TopicTooLong => defmt::write!(f, "TopicTooLong"),
        }
    }
}

/// One message ready for publishing. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage {
    topic: String<MAX_TOPIC_LEN>,
    payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl TelemetryMessage {
    /// Wrap an already encoded payload.
    pub fn new(topic: &str, payload: &[u8]) -> Result<Self, EncodeError> {
        Ok(Self {
            topic: String::try_from(topic).map_err(|_| EncodeError::TopicTooLong)?,
            payload: Vec::from_slice(payload).map_err(|_| EncodeError::PayloadTooLarge)?,
        })
    }

    /// Encode `reading` for `topic`.
    pub fn from_reading(topic: &str, reading: &SensorReading) -> Result<Self, EncodeError> {
        let text = encode_payload(reading)?;
        Self::new(topic, text.as_bytes())
    }

    /// Destination topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Render `reading` in the payload format, omitting unavailable values.
pub fn encode_payload(reading: &SensorReading) -> Result<String<MAX_PAYLOAD_LEN>, EncodeError> {
    let mut out: String<MAX_PAYLOAD_LEN> = String::new();
    write_payload(&mut out, reading).map_err(|_| EncodeError::PayloadTooLarge)?;
    Ok(out)
}

fn write_payload<W: fmt::Write>(out: &mut W, reading: &SensorReading) -> fmt::Result {
    let fields = [
        ("Temperature", reading.temperature),
        ("humidity", reading.humidity),
        ("Pressure", reading.pressure),
    ];

    out.write_char('{')?;
    let mut first = true;
    for (key, value) in fields {
        let Some(value) = value.filter(|v| v.is_finite()) else {
            continue;
        };
        if !first {
            out.write_str(", ")?;
        }
        write!(out, "\"{key}\":{value:.2}")?;
        first = false;
    }
    out.write_char('}')
}

/// A payload parsed back into numbers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct DecodedPayload {
    /// Degrees Celsius.
    #[serde(rename = "Temperature", default)]
    pub temperature: Option<f32>,
    /// Percent relative humidity.
    #[serde(rename = "humidity", default)]
    pub humidity: Option<f32>,
    /// Hectopascal.
    #[serde(rename = "Pressure", default)]
    pub pressure: Option<f32>,
}

impl From<DecodedPayload> for SensorReading {
    fn from(decoded: DecodedPayload) -> Self {
        SensorReading {
            temperature: decoded.temperature,
            humidity: decoded.humidity,
            pressure: decoded.pressure,
        }
    }
}

/// Parse a payload produced by [`encode_payload`].
pub fn decode_payload(payload: &[u8]) -> Result<DecodedPayload, serde_json_core::de::Error> {
    serde_json_core::from_slice(payload).map(|(decoded, _)| decoded)
}
