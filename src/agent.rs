//! The telemetry loop.
//!
//! [`run`] performs the one-time setup and then cycles forever:
//!
//! 1. join the wireless network (fatal on failure)
//! 2. establish the broker session (fatal on failure)
//! 3. bring up the sensors (failures only make readings unavailable)
//! 4. loop: sample, encode, publish, wait one period, toggle the liveness LED
//!
//! Steady-state failures never stop the loop. A failed publish is counted and
//! logged; with a [`ReconnectPolicy`] configured, a run of failures drops the
//! session and the loop rebuilds it with exponential backoff counted in
//! cycles.
//!
//! [`TelemetryAgent`] holds everything the loop needs. Hosts and tests drive
//! it one [`cycle`](TelemetryAgent::cycle) at a time.

use core::convert::Infallible;
use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::StatefulOutputPin;
use log::{debug, error, info, warn};

use crate::config::{AgentConfig, ConfigError, ReconnectPolicy};
use crate::network::wifi::{self, JoinError, WifiInterface};
use crate::network::{NetworkStack, Transport, TransportAdapter};
use crate::sensor::{SensorReading, SensorSource};
use crate::session::{self, Session};
use crate::telemetry::{EncodeError, TelemetryMessage};

/// Fatal errors raised before the loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    /// The configuration could not be loaded.
    Config(ConfigError),
    /// The wireless network could not be joined.
    NetworkJoin(JoinError),
    /// The broker session could not be established.
    Session(session::Error),
}

impl SetupError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            SetupError::NetworkJoin(_) => 1,
            SetupError::Session(_) => 2,
            SetupError::Config(_) => 3,
        }
    }
}

impl From<ConfigError> for SetupError {
    fn from(e: ConfigError) -> Self {
        SetupError::Config(e)
    }
}

impl From<JoinError> for SetupError {
    fn from(e: JoinError) -> Self {
        SetupError::NetworkJoin(e)
    }
}

impl From<session::Error> for SetupError {
    fn from(e: session::Error) -> Self {
        SetupError::Session(e)
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Config(e) => write!(f, "configuration error: {e}"),
            SetupError::NetworkJoin(e) => write!(f, "connection error: {e}"),
            SetupError::Session(e) => write!(f, "failed to connect to broker: {e}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SetupError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SetupError::Config(e) => defmt::write!(f, "Config({})", e),
            SetupError::NetworkJoin(e) => defmt::write!(f, "NetworkJoin({})", e),
            SetupError::Session(e) => defmt::write!(f, "Session({})", e),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A reading was published.
    Published {
        /// Payload length.
        bytes: usize,
    },
    /// The publish failed; the loop carries on.
    PublishFailed(session::Error),
    /// The reading did not fit a message.
    EncodeFailed(EncodeError),
    /// No session; waiting out the reconnect backoff.
    Offline,
    /// A reconnect attempt failed.
    ReconnectFailed(session::Error),
}

/// Counters kept across cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
    /// Cycles run.
    pub cycles: u32,
    /// Readings published.
    pub published: u32,
    /// Publish attempts that failed.
    pub publish_failures: u32,
    /// Readings that could not be encoded.
    pub encode_failures: u32,
    /// Samples with at least one value unavailable.
    pub sensor_faults: u32,
    /// Sessions rebuilt after being dropped.
    pub reconnects: u32,
    /// Publish failures since the last success.
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Backoff {
    window: u32,
    remaining: u32,
}

impl Backoff {
    const fn new() -> Self {
        Self {
            window: 1,
            remaining: 0,
        }
    }

    fn failed(&mut self, policy: &ReconnectPolicy) {
        self.remaining = self.window;
        self.window = self
            .window
            .saturating_mul(2)
            .min(policy.max_backoff_cycles.max(1));
    }
}

/// The running agent: a session, its sensors, a delay and a liveness LED.
pub struct TelemetryAgent<T, S, D, L>
where
    T: Transport,
    S: SensorSource,
    D: DelayNs,
    L: StatefulOutputPin,
{
    session: Session<T>,
    sensors: S,
    delay: D,
    led: L,
    config: AgentConfig,
    stats: LoopStats,
    backoff: Backoff,
}

impl<T, S, D, L> TelemetryAgent<T, S, D, L>
where
    T: Transport,
    S: SensorSource,
    D: DelayNs,
    L: StatefulOutputPin,
{
    /// Assemble an agent around a session that is usually already
    /// established. [`start`] does the full setup.
    pub fn new(session: Session<T>, sensors: S, delay: D, led: L, config: AgentConfig) -> Self {
        Self {
            session,
            sensors,
            delay,
            led,
            config,
            stats: LoopStats::default(),
            backoff: Backoff::new(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// The broker session.
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// The sensor source.
    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    /// The liveness LED.
    pub fn led(&self) -> &L {
        &self.led
    }

    /// Active configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one iteration of the loop.
    pub fn cycle(&mut self) -> CycleOutcome {
        self.stats.cycles = self.stats.cycles.saturating_add(1);

        let outcome = match self.ensure_session() {
            Ok(true) => self.publish_reading(),
            Ok(false) => CycleOutcome::Offline,
            Err(e) => CycleOutcome::ReconnectFailed(e),
        };

        self.delay.delay_ms(self.config.sample_period_ms());
        if let Err(e) = self.led.toggle() {
            debug!("liveness LED toggle failed: {:?}", e);
        }
        outcome
    }

    /// Run `cycles` iterations and return the counters.
    pub fn run_cycles(&mut self, cycles: u32) -> LoopStats {
        for _ in 0..cycles {
            self.cycle();
        }
        self.stats
    }

    /// Cycle until reset.
    pub fn run_forever(mut self) -> ! {
        loop {
            self.cycle();
        }
    }

    /// Close the session cleanly.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.session.disconnect() {
            debug!("shutdown: {}", e);
        }
        info!(
            "stopped after {} cycles, {} published, {} failed",
            self.stats.cycles, self.stats.published, self.stats.publish_failures
        );
    }

    /// Returns whether publishing should be attempted this cycle.
    fn ensure_session(&mut self) -> Result<bool, session::Error> {
        let Some(policy) = self.config.reconnect() else {
            return Ok(true);
        };
        if self.session.is_established() {
            return Ok(true);
        }
        if self.backoff.remaining > 0 {
            self.backoff.remaining -= 1;
            return Ok(false);
        }

        info!("reconnecting to {}", self.config.broker());
        match self
            .session
            .connect(self.config.broker(), self.config.credentials())
        {
            Ok(()) => {
                self.stats.reconnects = self.stats.reconnects.saturating_add(1);
                self.stats.consecutive_failures = 0;
                self.backoff = Backoff::new();
                Ok(true)
            }
            Err(e) => {
                self.backoff.failed(&policy);
                warn!(
                    "reconnect failed: {}, next attempt in {} cycles",
                    e, self.backoff.remaining
                );
                Err(e)
            }
        }
    }

    fn publish_reading(&mut self) -> CycleOutcome {
        let reading = self.sensors.sample();
        log_reading(&reading);
        if !reading.is_complete() {
            self.stats.sensor_faults = self.stats.sensor_faults.saturating_add(1);
        }

        let message = match TelemetryMessage::from_reading(self.config.topic(), &reading) {
            Ok(message) => message,
            Err(e) => {
                self.stats.encode_failures = self.stats.encode_failures.saturating_add(1);
                warn!("reading not encoded: {}", e);
                return CycleOutcome::EncodeFailed(e);
            }
        };

        match self.session.publish(message.topic(), message.payload()) {
            Ok(()) => {
                self.stats.published = self.stats.published.saturating_add(1);
                self.stats.consecutive_failures = 0;
                CycleOutcome::Published {
                    bytes: message.payload().len(),
                }
            }
            Err(e) => {
                self.stats.publish_failures = self.stats.publish_failures.saturating_add(1);
                self.stats.consecutive_failures =
                    self.stats.consecutive_failures.saturating_add(1);
                warn!("publish failed: {}", e);
                self.drop_session_if_dead();
                CycleOutcome::PublishFailed(e)
            }
        }
    }

    fn drop_session_if_dead(&mut self) {
        let Some(policy) = self.config.reconnect() else {
            return;
        };
        if self.stats.consecutive_failures < policy.failure_threshold
            || !self.session.is_established()
        {
            return;
        }

        warn!(
            "{} consecutive publish failures, dropping session",
            self.stats.consecutive_failures
        );
        if let Err(e) = self.session.disconnect() {
            debug!("session teardown: {}", e);
        }
        self.backoff = Backoff::new();
    }
}

impl<T, S, D, L> fmt::Debug for TelemetryAgent<T, S, D, L>
where
    T: Transport,
    S: SensorSource,
    D: DelayNs,
    L: StatefulOutputPin,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryAgent")
            .field("session", &self.session)
            .field("stats", &self.stats)
            .finish()
    }
}

fn log_reading(reading: &SensorReading) {
    debug!(
        "temperature {:?} humidity {:?} pressure {:?}",
        reading.temperature, reading.humidity, reading.pressure
    );
}

/// Join the network, establish the session and bring up the sensors.
///
/// The agent borrows `network` for as long as it lives; the transport opens
/// its sockets on it.
pub fn start<'n, W, S, D, L>(
    network: &'n mut W,
    mut sensors: S,
    delay: D,
    led: L,
    config: AgentConfig,
) -> Result<TelemetryAgent<TransportAdapter<'n, W>, S, D, L>, SetupError>
where
    W: WifiInterface + NetworkStack,
    S: SensorSource,
    D: DelayNs,
    L: StatefulOutputPin,
{
    if let Err(e) = wifi::join(network, config.join()) {
        error!("Connection error: {}", e);
        return Err(SetupError::NetworkJoin(e));
    }

    let network: &'n W = network;
    let mut session = Session::new(TransportAdapter::new(network), config.keep_alive_seconds());
    if let Err(e) = session.connect(config.broker(), config.credentials()) {
        error!("failed to connect to {}: {}", config.broker(), e);
        return Err(SetupError::Session(e));
    }
    info!("successfully connected!");

    let ids = sensors.init();
    if ids.hum_temp.is_none() || ids.pressure.is_none() {
        warn!("sensor bring-up incomplete, affected readings will be unavailable");
    }

    Ok(TelemetryAgent::new(session, sensors, delay, led, config))
}

/// Set up and cycle forever. Returns only on a setup failure.
pub fn run<W, S, D, L>(
    network: &mut W,
    sensors: S,
    delay: D,
    led: L,
    config: AgentConfig,
) -> Result<Infallible, SetupError>
where
    W: WifiInterface + NetworkStack,
    S: SensorSource,
    D: DelayNs,
    L: StatefulOutputPin,
{
    let agent = start(network, sensors, delay, led, config)?;
    agent.run_forever()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        assert_eq!(
            SetupError::NetworkJoin(JoinError::ConnectionFailed).exit_code(),
            1
        );
        assert_eq!(SetupError::Session(session::Error::ResolutionFailed).exit_code(), 2);
        assert_eq!(SetupError::Config(ConfigError::InvalidSsid).exit_code(), 3);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = ReconnectPolicy {
            failure_threshold: 3,
            max_backoff_cycles: 4,
        };
        let mut backoff = Backoff::new();
        let waits: [u32; 5] = core::array::from_fn(|_| {
            backoff.failed(&policy);
            backoff.remaining
        });
        assert_eq!(waits, [1, 2, 4, 4, 4]);
    }
}
