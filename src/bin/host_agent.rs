//! Host build of the telemetry agent.
//!
//! Runs the agent over `std::net` with simulated sensors. The machine is
//! assumed to be online already, so the wireless join only logs. Settings come
//! from `TELEMETRY_*` variables (a `.env` file is honoured).
//!
//! ```text
//! telemetry-agent [--cycles N]
//! ```
//!
//! Without `--cycles` the agent runs until killed.

use std::io::{self, Read as _, Write as _};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use log::{error, info};

use telemetry_agent::agent::{self, SetupError};
use telemetry_agent::config::{AgentConfig, ConfigError};
use telemetry_agent::network::error::Error;
use telemetry_agent::network::wifi::{JoinError, MacAddress, ScanResults, Security, WifiInterface};
use telemetry_agent::network::{Close, Connect, Connection, NetworkStack, Read, Write};
use telemetry_agent::sensor::EnvironmentSensors;
use telemetry_agent::sensor::simulated::{SimulatedBarometer, SimulatedHumidityTemperature};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A TCP socket that exists before it is connected, like an embedded one.
struct HostSocket {
    stream: Option<TcpStream>,
}

fn io_error(e: io::Error, fallback: Error) -> Error {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout,
        io::ErrorKind::ConnectionRefused => Error::ConnectionRefused,
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
        _ => fallback,
    }
}

impl Connect for HostSocket {
    type Error = Error;

    fn connect(&mut self, remote: SocketAddr) -> Result<(), Self::Error> {
        let stream = TcpStream::connect_timeout(&remote, CONNECT_TIMEOUT)
            .map_err(|e| io_error(e, Error::ConnectFailed))?;
        stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(IO_TIMEOUT)))
            .and_then(|()| stream.set_nodelay(true))
            .map_err(|_| Error::ConnectFailed)?;
        self.stream = Some(stream);
        Ok(())
    }
}

impl Read for HostSocket {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        stream.read(buf).map_err(|e| io_error(e, Error::ReadError))
    }
}

impl Write for HostSocket {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        stream.write(buf).map_err(|e| io_error(e, Error::WriteError))
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        stream.flush().map_err(|e| io_error(e, Error::WriteError))
    }
}

impl Close for HostSocket {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        if let Some(stream) = self.stream {
            // peer may already be gone
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Ok(())
    }
}

impl Connection for HostSocket {}

/// The host's own network connection standing in for the radio.
#[derive(Default)]
struct HostNetwork {
    joined: bool,
}

impl WifiInterface for HostNetwork {
    fn scan(&mut self) -> Result<ScanResults, JoinError> {
        Ok(ScanResults::new())
    }

    fn connect(
        &mut self,
        ssid: &str,
        _passphrase: &str,
        _security: Security,
    ) -> Result<(), JoinError> {
        info!("host networking in use, not joining {}", ssid);
        self.joined = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), JoinError> {
        self.joined = false;
        Ok(())
    }

    fn mac_address(&self) -> Option<MacAddress> {
        None
    }

    fn ip_address(&self) -> Option<IpAddr> {
        None
    }

    fn netmask(&self) -> Option<IpAddr> {
        None
    }

    fn gateway(&self) -> Option<IpAddr> {
        None
    }

    fn rssi(&self) -> i8 {
        0
    }
}

impl NetworkStack for HostNetwork {
    type Socket = HostSocket;
    type Error = Error;

    fn resolve(&self, host: &str) -> Result<Option<IpAddr>, Self::Error> {
        let mut addresses = (host, 0u16)
            .to_socket_addrs()
            .map_err(|_| Error::ResolutionFailed)?;
        Ok(addresses.next().map(|address| address.ip()))
    }

    fn open(&self) -> Result<Self::Socket, Self::Error> {
        if !self.joined {
            return Err(Error::NotOpen);
        }
        Ok(HostSocket { stream: None })
    }
}

struct ThreadDelay;

impl DelayNs for ThreadDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }
}

/// Liveness indicator that reports its level in the log.
#[derive(Default)]
struct LogLed {
    on: bool,
}

impl ErrorType for LogLed {
    type Error = core::convert::Infallible;
}

impl OutputPin for LogLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.on = false;
        log::trace!("LED off");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.on = true;
        log::trace!("LED on");
        Ok(())
    }
}

impl StatefulOutputPin for LogLed {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.on)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.on)
    }
}

fn parse_cycles() -> Result<Option<u32>, ConfigError> {
    let args: Vec<String> = std::env::args().collect();
    match args.iter().position(|arg| arg == "--cycles") {
        Some(i) => args
            .get(i + 1)
            .and_then(|n| n.parse().ok())
            .map(Some)
            .ok_or(ConfigError::Invalid("--cycles")),
        None => Ok(None),
    }
}

fn fail(e: SetupError) -> ExitCode {
    error!("{}", e);
    ExitCode::from(e.exit_code())
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, cycles) = match AgentConfig::from_env().and_then(|c| Ok((c, parse_cycles()?))) {
        Ok(loaded) => loaded,
        Err(e) => return fail(SetupError::Config(e)),
    };

    let mut network = HostNetwork::default();
    let sensors = EnvironmentSensors::new(
        SimulatedHumidityTemperature::new(),
        SimulatedBarometer::new(),
    );

    match cycles {
        Some(n) => {
            match agent::start(&mut network, sensors, ThreadDelay, LogLed::default(), config) {
                Ok(mut agent) => {
                    agent.run_cycles(n);
                    agent.shutdown();
                    ExitCode::SUCCESS
                }
                Err(e) => fail(e),
            }
        }
        None => match agent::run(&mut network, sensors, ThreadDelay, LogLed::default(), config) {
            Ok(never) => match never {},
            Err(e) => fail(e),
        },
    }
}
