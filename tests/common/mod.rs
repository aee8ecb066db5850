#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use telemetry_agent::config::AgentConfig;
use telemetry_agent::network::application::mqtt::{CONNACK, PUBLISH};
use telemetry_agent::network::error::Error;
use telemetry_agent::network::wifi::{
    AccessPoint, JoinError, MacAddress, ScanResults, Security, WifiInterface,
};
use telemetry_agent::network::{Close, Connect, Connection, NetworkStack, Read, Write};
use telemetry_agent::sensor::{SensorIds, SensorReading, SensorSource};

pub const BROKER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));

/// Everything the mocks did, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Scan,
    Join(String),
    Resolve(String),
    Open,
    Connect(SocketAddr),
    Write(usize),
    Close,
    Delay(u32),
    Toggle,
}

/// State shared by every mock so tests can script and inspect the wire.
#[derive(Debug)]
pub struct Wire {
    pub events: Vec<Event>,
    pub written: Vec<u8>,
    pub inbound: VecDeque<u8>,
    pub connack: [u8; 4],
    pub open_sockets: usize,
    pub refuse_connect: bool,
    pub fail_writes: bool,
    pub fail_flush: bool,
    /// Returned by every read and write while set.
    pub io_error: Option<Error>,
    pub max_chunk: usize,
}

impl Default for Wire {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            written: Vec::new(),
            inbound: VecDeque::new(),
            connack: [CONNACK, 2, 0, 0],
            open_sockets: 0,
            refuse_connect: false,
            fail_writes: false,
            fail_flush: false,
            io_error: None,
            max_chunk: usize::MAX,
        }
    }
}

pub type SharedWire = Rc<RefCell<Wire>>;

pub fn wire() -> SharedWire {
    Rc::new(RefCell::new(Wire::default()))
}

#[derive(Debug)]
pub struct MockSocket {
    wire: SharedWire,
    connected: bool,
}

impl Connect for MockSocket {
    type Error = Error;

    fn connect(&mut self, remote: SocketAddr) -> Result<(), Self::Error> {
        let mut wire = self.wire.borrow_mut();
        wire.events.push(Event::Connect(remote));
        if wire.refuse_connect {
            return Err(Error::ConnectionRefused);
        }
        let connack = wire.connack;
        wire.inbound.clear();
        wire.inbound.extend(connack);
        self.connected = true;
        Ok(())
    }
}

impl Read for MockSocket {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.connected {
            return Err(Error::NotOpen);
        }
        let mut wire = self.wire.borrow_mut();
        if let Some(e) = wire.io_error {
            return Err(e);
        }
        let n = buf.len().min(wire.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(wire.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockSocket {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.connected {
            return Err(Error::NotOpen);
        }
        let mut wire = self.wire.borrow_mut();
        if let Some(e) = wire.io_error {
            return Err(e);
        }
        if wire.fail_writes {
            return Err(Error::WriteError);
        }
        let n = buf.len().min(wire.max_chunk);
        wire.written.extend_from_slice(&buf[..n]);
        wire.events.push(Event::Write(n));
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.wire.borrow().fail_flush {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }
}

impl Close for MockSocket {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        let mut wire = self.wire.borrow_mut();
        wire.events.push(Event::Close);
        wire.open_sockets -= 1;
        Ok(())
    }
}

impl Connection for MockSocket {}

/// Radio plus network stack.
#[derive(Debug)]
pub struct MockNetwork {
    pub wire: SharedWire,
    pub join_result: Result<(), JoinError>,
    pub scan_result: Result<ScanResults, JoinError>,
    pub address: Result<Option<IpAddr>, Error>,
    joined: bool,
}

impl MockNetwork {
    pub fn new(wire: &SharedWire) -> Self {
        let mut networks = ScanResults::new();
        for (ssid, rssi) in [("HomeWiFi", -48), ("Neighbour", -81)] {
            let _ = networks.push(AccessPoint {
                ssid: heapless::String::try_from(ssid).unwrap(),
                rssi,
                security: Security::WpaWpa2,
            });
        }
        Self {
            wire: Rc::clone(wire),
            join_result: Ok(()),
            scan_result: Ok(networks),
            address: Ok(Some(BROKER_IP)),
            joined: false,
        }
    }
}

impl WifiInterface for MockNetwork {
    fn scan(&mut self) -> Result<ScanResults, JoinError> {
        self.wire.borrow_mut().events.push(Event::Scan);
        self.scan_result.clone()
    }

    fn connect(&mut self, ssid: &str, _passphrase: &str, _security: Security) -> Result<(), JoinError> {
        self.wire.borrow_mut().events.push(Event::Join(ssid.to_string()));
        self.join_result?;
        self.joined = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), JoinError> {
        self.joined = false;
        Ok(())
    }

    fn mac_address(&self) -> Option<MacAddress> {
        Some(MacAddress([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]))
    }

    fn ip_address(&self) -> Option<IpAddr> {
        self.joined.then_some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42)))
    }

    fn netmask(&self) -> Option<IpAddr> {
        self.joined.then_some(IpAddr::V4(Ipv4Addr::new(255, 255, 255, 0)))
    }

    fn gateway(&self) -> Option<IpAddr> {
        self.joined.then_some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)))
    }

    fn rssi(&self) -> i8 {
        -48
    }
}

impl NetworkStack for MockNetwork {
    type Socket = MockSocket;
    type Error = Error;

    fn resolve(&self, host: &str) -> Result<Option<IpAddr>, Self::Error> {
        self.wire.borrow_mut().events.push(Event::Resolve(host.to_string()));
        self.address
    }

    fn open(&self) -> Result<Self::Socket, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        wire.events.push(Event::Open);
        wire.open_sockets += 1;
        Ok(MockSocket {
            wire: Rc::clone(&self.wire),
            connected: false,
        })
    }
}

/// Plays back a fixed list of readings, then repeats the last one.
#[derive(Debug, Default)]
pub struct ScriptedSensors {
    readings: VecDeque<SensorReading>,
    last: SensorReading,
    pub inits: usize,
}

impl ScriptedSensors {
    pub fn repeating(reading: SensorReading) -> Self {
        Self {
            readings: VecDeque::new(),
            last: reading,
            inits: 0,
        }
    }

    pub fn sequence(readings: impl IntoIterator<Item = SensorReading>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            last: SensorReading::default(),
            inits: 0,
        }
    }
}

impl SensorSource for ScriptedSensors {
    fn init(&mut self) -> SensorIds {
        self.inits += 1;
        SensorIds {
            hum_temp: Some(0xBC),
            pressure: Some(0xB1),
        }
    }

    fn sample(&mut self) -> SensorReading {
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        self.last
    }
}

#[derive(Debug)]
pub struct MockDelay {
    wire: SharedWire,
}

impl MockDelay {
    pub fn new(wire: &SharedWire) -> Self {
        Self {
            wire: Rc::clone(wire),
        }
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.wire.borrow_mut().events.push(Event::Delay(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.wire.borrow_mut().events.push(Event::Delay(ms));
    }
}

#[derive(Debug)]
pub struct MockLed {
    wire: SharedWire,
    pub on: bool,
}

impl MockLed {
    pub fn new(wire: &SharedWire) -> Self {
        Self {
            wire: Rc::clone(wire),
            on: false,
        }
    }
}

impl ErrorType for MockLed {
    type Error = Infallible;
}

impl OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.on = false;
        self.wire.borrow_mut().events.push(Event::Toggle);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.on = true;
        self.wire.borrow_mut().events.push(Event::Toggle);
        Ok(())
    }
}

impl StatefulOutputPin for MockLed {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.on)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.on)
    }
}

pub fn config() -> AgentConfig {
    AgentConfig::new("HomeWiFi", "mysecret8")
        .unwrap()
        .with_access_token("A1_TEST_TOKEN")
        .unwrap()
}

/// Split the bytes written so far into MQTT packets: (first byte, body).
pub fn packets(written: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut packets = Vec::new();
    let mut rest = written;
    while let Some((&header, tail)) = rest.split_first() {
        let mut length = 0usize;
        let mut shift = 0;
        let mut used = 0;
        for &byte in tail {
            length |= usize::from(byte & 0x7F) << shift;
            shift += 7;
            used += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        let body = &tail[used..used + length];
        packets.push((header, body.to_vec()));
        rest = &tail[used + length..];
    }
    packets
}

/// (topic, payload) of every PUBLISH written so far.
pub fn publishes(wire: &SharedWire) -> Vec<(String, String)> {
    packets(&wire.borrow().written)
        .into_iter()
        .filter(|(header, _)| header & 0xF0 == PUBLISH)
        .map(|(_, body)| {
            let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
            let topic = String::from_utf8(body[2..2 + topic_len].to_vec()).unwrap();
            let payload = String::from_utf8(body[2 + topic_len..].to_vec()).unwrap();
            (topic, payload)
        })
        .collect()
}

pub fn events(wire: &SharedWire) -> Vec<Event> {
    wire.borrow().events.clone()
}
