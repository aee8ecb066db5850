//! Agent configuration.
//!
//! Every tunable lives in [`AgentConfig`]. Values are held in fixed-capacity
//! strings so the configuration can be built on a device without a heap;
//! setters validate as they go, so a constructed config is always usable.
//!
//! On hosts (`std` feature) the config can be read from `TELEMETRY_*`
//! environment variables:
//!
//! | Variable                       | Default                    |
//! |--------------------------------|----------------------------|
//! | `TELEMETRY_WIFI_SSID`          | required                   |
//! | `TELEMETRY_WIFI_PASSWORD`      | empty (open network)       |
//! | `TELEMETRY_WIFI_SECURITY`      | `wpa/wpa2`                 |
//! | `TELEMETRY_BROKER_HOST`        | `demo.thingsboard.io`      |
//! | `TELEMETRY_BROKER_PORT`        | `1883`                     |
//! | `TELEMETRY_ACCESS_TOKEN`       | none                       |
//! | `TELEMETRY_CLIENT_ID`          | empty                      |
//! | `TELEMETRY_TOPIC`              | `v1/devices/me/telemetry`  |
//! | `TELEMETRY_SAMPLE_PERIOD_MS`   | `500`                      |
//! | `TELEMETRY_KEEP_ALIVE_SECS`    | `60`                       |
//! | `TELEMETRY_FAILURE_THRESHOLD`  | `3`, `0` disables reconnect |

use core::fmt;
use core::str::FromStr;

use heapless::String;

use crate::network::application::mqtt::{self, MAX_TOPIC_LEN};
use crate::network::wifi::{self, JoinParams, Security};
use crate::network::NetworkEndpoint;
use crate::session::Credentials;

/// Default broker host.
pub const DEFAULT_BROKER_HOST: &str = "demo.thingsboard.io";
/// Default broker port (plain MQTT).
pub const DEFAULT_BROKER_PORT: u16 = 1883;
/// Default telemetry topic.
pub const DEFAULT_TOPIC: &str = "v1/devices/me/telemetry";
/// Default sampling period.
pub const DEFAULT_SAMPLE_PERIOD_MS: u32 = 500;
/// Default MQTT keep-alive.
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;

/// Configuration errors. The payload names the offending field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is absent.
    Missing(&'static str),
    /// A value does not fit its fixed capacity.
    TooLong(&'static str),
    /// A value could not be parsed or is out of range.
    Invalid(&'static str),
    /// SSID fails the join rules.
    InvalidSsid,
    /// Passphrase fails the join rules.
    InvalidPassphrase,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(field) => write!(f, "{field} is required"),
            ConfigError::TooLong(field) => write!(f, "{field} is too long"),
            ConfigError::Invalid(field) => write!(f, "{field} is invalid"),
            ConfigError::InvalidSsid => write!(f, "SSID must be 1-32 printable ASCII bytes"),
            ConfigError::InvalidPassphrase => {
                write!(f, "passphrase must be empty or 8-64 bytes")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::Missing(field) => defmt::write!(f, "Missing({})", field),
            ConfigError::TooLong(field) => defmt::write!(f, "TooLong({})", field),
            ConfigError::Invalid(field) => defmt::write!(f, "Invalid({})", field),
            ConfigError::InvalidSsid => defmt::write!(f, "InvalidSsid"),
            ConfigError::InvalidPassphrase => defmt::write!(f, "InvalidPassphrase"),
        }
    }
}

/// When and how often the loop tries to rebuild a failing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive publish failures that make the loop drop the session.
    pub failure_threshold: u32,
    /// Upper bound, in cycles, on the wait between reconnect attempts. The
    /// wait starts at one cycle and doubles after every failed attempt.
    pub max_backoff_cycles: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            max_backoff_cycles: 64,
        }
    }
}

/// Everything the agent needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    join: JoinParams,
    broker: NetworkEndpoint,
    credentials: Credentials,
    topic: String<MAX_TOPIC_LEN>,
    keep_alive_seconds: u16,
    sample_period_ms: u32,
    reconnect: Option<ReconnectPolicy>,
}

impl AgentConfig {
    /// A configuration for network `ssid` with defaults everywhere else.
    pub fn new(ssid: &str, passphrase: &str) -> Result<Self, ConfigError> {
        wifi::validate_ssid(ssid).map_err(|_| ConfigError::InvalidSsid)?;
        wifi::validate_passphrase(passphrase).map_err(|_| ConfigError::InvalidPassphrase)?;

        Ok(Self {
            join: JoinParams {
                ssid: String::try_from(ssid).map_err(|_| ConfigError::InvalidSsid)?,
                passphrase: String::try_from(passphrase)
                    .map_err(|_| ConfigError::InvalidPassphrase)?,
                security: Security::default(),
            },
            broker: NetworkEndpoint::new(DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT)
                .ok_or(ConfigError::Invalid("broker host"))?,
            credentials: Credentials::default(),
            topic: String::try_from(DEFAULT_TOPIC).map_err(|_| ConfigError::TooLong("topic"))?,
            keep_alive_seconds: DEFAULT_KEEP_ALIVE_SECS,
            sample_period_ms: DEFAULT_SAMPLE_PERIOD_MS,
            reconnect: Some(ReconnectPolicy::default()),
        })
    }

    /// Set the wireless security mode.
    pub fn with_security(mut self, security: Security) -> Self {
        self.join.security = security;
        self
    }

    /// Point the agent at another broker.
    pub fn with_broker(mut self, host: &str, port: u16) -> Result<Self, ConfigError> {
        self.broker = NetworkEndpoint::new(host, port).ok_or(ConfigError::Invalid("broker host"))?;
        Ok(self)
    }

    /// Set the device access token sent as the MQTT username.
    pub fn with_access_token(mut self, token: &str) -> Result<Self, ConfigError> {
        self.credentials = self
            .credentials
            .with_username(token)
            .ok_or(ConfigError::TooLong("access token"))?;
        Ok(self)
    }

    /// Set the MQTT client identifier, keeping any access token.
    pub fn with_client_id(mut self, client_id: &str) -> Result<Self, ConfigError> {
        let mut credentials =
            Credentials::new(client_id).ok_or(ConfigError::TooLong("client id"))?;
        if let Some(token) = self.credentials.username() {
            credentials = credentials
                .with_username(token)
                .ok_or(ConfigError::TooLong("access token"))?;
        }
        self.credentials = credentials;
        Ok(self)
    }

    /// Set the topic readings are published to.
    pub fn with_topic(mut self, topic: &str) -> Result<Self, ConfigError> {
        mqtt::validate_topic(topic).map_err(|_| ConfigError::Invalid("topic"))?;
        self.topic = String::try_from(topic).map_err(|_| ConfigError::TooLong("topic"))?;
        Ok(self)
    }

    /// Set the sampling period. Must be non-zero.
    pub fn with_sample_period_ms(mut self, period_ms: u32) -> Result<Self, ConfigError> {
        if period_ms == 0 {
            return Err(ConfigError::Invalid("sample period"));
        }
        self.sample_period_ms = period_ms;
        Ok(self)
    }

    /// Set the MQTT keep-alive interval.
    pub fn with_keep_alive_seconds(mut self, seconds: u16) -> Self {
        self.keep_alive_seconds = seconds;
        self
    }

    /// Enable or disable reconnecting after repeated publish failures.
    pub fn with_reconnect(mut self, policy: Option<ReconnectPolicy>) -> Self {
        self.reconnect = policy;
        self
    }

    /// Build a config from a key lookup, such as the process environment.
    ///
    /// Keys are the `TELEMETRY_*` names listed in the module docs.
    pub fn from_lookup<F, S>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<S>,
        S: AsRef<str>,
    {
        let ssid = lookup("TELEMETRY_WIFI_SSID").ok_or(ConfigError::Missing("wifi ssid"))?;
        let passphrase = lookup("TELEMETRY_WIFI_PASSWORD");
        let mut config = Self::new(ssid.as_ref(), text_or(&passphrase, ""))?;

        if let Some(security) = lookup("TELEMETRY_WIFI_SECURITY") {
            let security = Security::from_name(security.as_ref())
                .ok_or(ConfigError::Invalid("wifi security"))?;
            config = config.with_security(security);
        }

        let host = lookup("TELEMETRY_BROKER_HOST");
        let host = text_or(&host, DEFAULT_BROKER_HOST);
        let port = parse_or(&lookup, "TELEMETRY_BROKER_PORT", "broker port", DEFAULT_BROKER_PORT)?;
        config = config.with_broker(host, port)?;

        if let Some(client_id) = lookup("TELEMETRY_CLIENT_ID") {
            config = config.with_client_id(client_id.as_ref())?;
        }
        if let Some(token) = lookup("TELEMETRY_ACCESS_TOKEN") {
            config = config.with_access_token(token.as_ref())?;
        }
        if let Some(topic) = lookup("TELEMETRY_TOPIC") {
            config = config.with_topic(topic.as_ref())?;
        }

        let period = parse_or(
            &lookup,
            "TELEMETRY_SAMPLE_PERIOD_MS",
            "sample period",
            DEFAULT_SAMPLE_PERIOD_MS,
        )?;
        config = config.with_sample_period_ms(period)?;

        let keep_alive = parse_or(
            &lookup,
            "TELEMETRY_KEEP_ALIVE_SECS",
            "keep alive",
            DEFAULT_KEEP_ALIVE_SECS,
        )?;
        config = config.with_keep_alive_seconds(keep_alive);

        let threshold = parse_or(
            &lookup,
            "TELEMETRY_FAILURE_THRESHOLD",
            "failure threshold",
            ReconnectPolicy::default().failure_threshold,
        )?;
        config = config.with_reconnect((threshold > 0).then(|| ReconnectPolicy {
            failure_threshold: threshold,
            ..ReconnectPolicy::default()
        }));

        Ok(config)
    }

    /// Build a config from the process environment.
    #[cfg(feature = "std")]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Wi-Fi join parameters.
    pub fn join(&self) -> &JoinParams {
        &self.join
    }

    /// Broker endpoint.
    pub fn broker(&self) -> &NetworkEndpoint {
        &self.broker
    }

    /// MQTT credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Telemetry topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// MQTT keep-alive in seconds.
    pub fn keep_alive_seconds(&self) -> u16 {
        self.keep_alive_seconds
    }

    /// Sampling period in milliseconds.
    pub fn sample_period_ms(&self) -> u32 {
        self.sample_period_ms
    }

    /// Reconnect policy, `None` when disabled.
    pub fn reconnect(&self) -> Option<ReconnectPolicy> {
        self.reconnect
    }
}

fn text_or<'a, S: AsRef<str>>(value: &'a Option<S>, default: &'a str) -> &'a str {
    value.as_ref().map_or(default, |s| s.as_ref())
}

fn parse_or<F, S, T>(
    lookup: &F,
    key: &str,
    field: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<S>,
    S: AsRef<str>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .as_ref()
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(field)),
        None => Ok(default),
    }
}
