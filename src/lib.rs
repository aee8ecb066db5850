//! # telemetry-agent
//!
//! A `no_std` telemetry agent for constrained devices. It joins a wireless
//! network, holds an MQTT 3.1.1 session to a broker and publishes
//! environmental readings (temperature, humidity, pressure) at a fixed
//! period.
//!
//! ## Layers
//!
//! - [`network`]: the platform traits (radio, network stack, sockets), the
//!   [`TransportAdapter`](network::TransportAdapter) and MQTT framing
//! - [`session`]: the connect/publish/disconnect state machine over a
//!   [`Transport`](network::Transport)
//! - [`sensor`]: sensor driver traits and the two-device environmental source
//! - [`telemetry`]: the message type and payload text format
//! - [`agent`]: setup and the steady-state loop
//! - [`config`]: every tunable, with defaults
//!
//! ## Usage
//!
//! A platform provides a type implementing both
//! [`WifiInterface`](network::wifi::WifiInterface) and
//! [`NetworkStack`](network::NetworkStack), two sensor drivers, an
//! `embedded-hal` delay and an output pin:
//!
//! ```rust,ignore
//! use telemetry_agent::agent;
//! use telemetry_agent::config::AgentConfig;
//! use telemetry_agent::sensor::EnvironmentSensors;
//!
//! let config = AgentConfig::new("HomeWiFi", "mysecret8")?
//!     .with_access_token("your access token")?;
//! let sensors = EnvironmentSensors::new(hts221, lps22hb);
//!
//! // Returns only if setup fails.
//! let err = agent::run(&mut wifi, sensors, delay, led, config).unwrap_err();
//! ```
//!
//! Building a payload needs nothing but a reading:
//!
//! ```rust
//! use telemetry_agent::sensor::SensorReading;
//! use telemetry_agent::telemetry::encode_payload;
//!
//! let payload = encode_payload(&SensorReading::new(21.43, 38.2, 1013.25)).unwrap();
//! assert_eq!(payload.as_str(), r#"{"Temperature":21.43, "humidity":38.20, "Pressure":1013.25}"#);
//! ```
//!
//! ## Optional Features
//!
//! - `std`: environment configuration and the `telemetry-agent` host binary
//! - `defmt`: `defmt::Format` for the error types

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Network abstraction layer: platform traits, transport adapter and MQTT
/// framing.
pub mod network;

/// Broker session management.
pub mod session;

/// Sensor driver traits and sources.
pub mod sensor;

/// Telemetry messages and payload encoding.
pub mod telemetry;

/// Agent configuration.
pub mod config;

/// Setup and the telemetry loop.
pub mod agent;
