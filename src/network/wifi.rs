//! Wireless network join.
//!
//! The radio driver is a black box behind [`WifiInterface`]. This module owns
//! only the one-time join procedure the agent runs at boot: scan (purely
//! diagnostic), connect with the configured credentials, then report the
//! link parameters.
//!
//! There is no retry policy here. A failed join is fatal to the agent; a
//! driver that wants retries implements them inside `connect`.

use core::fmt;
use core::net::IpAddr;

use heapless::{String, Vec};
use log::{info, warn};

/// Upper bound on scan results kept and reported.
pub const MAX_SCAN_RESULTS: usize = 15;

/// Maximum SSID length in bytes.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA passphrase length in bytes.
pub const MAX_PASSPHRASE_LEN: usize = 64;

/// Wireless security mode requested when joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption.
    Open,
    /// WEP (legacy).
    Wep,
    /// WPA or WPA2, whichever the access point offers.
    #[default]
    WpaWpa2,
    /// WPA2 only.
    Wpa2,
    /// WPA3 only.
    Wpa3,
}

impl Security {
    /// Parse the names accepted in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "open" | "none" => Some(Self::Open),
            "wep" => Some(Self::Wep),
            "wpa" | "wpa/wpa2" | "wpa_wpa2" => Some(Self::WpaWpa2),
            "wpa2" => Some(Self::Wpa2),
            "wpa3" => Some(Self::Wpa3),
            _ => None,
        }
    }
}

/// One entry of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    /// Network name.
    pub ssid: String<MAX_SSID_LEN>,
    /// Signal strength in dBm.
    pub rssi: i8,
    /// Advertised security mode.
    pub security: Security,
}

/// Scan results, truncated to [`MAX_SCAN_RESULTS`].
pub type ScanResults = Vec<AccessPoint, MAX_SCAN_RESULTS>;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Errors from the join procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// SSID empty, too long or not printable ASCII.
    InvalidSsid,
    /// Passphrase neither empty nor 8..=64 bytes.
    InvalidPassphrase,
    /// The radio could not scan.
    ScanFailed,
    /// Association or DHCP failed.
    ConnectionFailed,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassphrase => {
                write!(f, "passphrase invalid (must be 8-64 bytes, or empty for open)")
            }
            Self::ScanFailed => write!(f, "network scan failed"),
            Self::ConnectionFailed => write!(f, "network connection failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for JoinError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            JoinError::InvalidSsid => defmt::write!(f, "InvalidSsid"),
            JoinError::InvalidPassphrase => defmt::write!(f, "InvalidPassphrase"),
            JoinError::ScanFailed => defmt::write!(f, "ScanFailed"),
            JoinError::ConnectionFailed => defmt::write!(f, "ConnectionFailed"),
        }
    }
}

/// The radio driver as seen by the agent.
pub trait WifiInterface {
    /// List visible networks, at most [`MAX_SCAN_RESULTS`].
    fn scan(&mut self) -> Result<ScanResults, JoinError>;

    /// Associate with `ssid` and obtain an address.
    fn connect(&mut self, ssid: &str, passphrase: &str, security: Security)
    -> Result<(), JoinError>;

    /// Leave the network.
    fn disconnect(&mut self) -> Result<(), JoinError>;

    /// Hardware address of the interface.
    fn mac_address(&self) -> Option<MacAddress>;

    /// Address assigned to the interface.
    fn ip_address(&self) -> Option<IpAddr>;

    /// Netmask of the assigned address.
    fn netmask(&self) -> Option<IpAddr>;

    /// Default gateway.
    fn gateway(&self) -> Option<IpAddr>;

    /// Signal strength of the current association in dBm.
    fn rssi(&self) -> i8;
}

/// What the agent needs to join a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParams {
    /// Network name.
    pub ssid: String<MAX_SSID_LEN>,
    /// WPA passphrase, empty for open networks.
    pub passphrase: String<MAX_PASSPHRASE_LEN>,
    /// Security mode.
    pub security: Security,
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Check an SSID: 1..=32 printable ASCII bytes.
pub fn validate_ssid(ssid: &str) -> Result<(), JoinError> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN || !is_printable_ascii(ssid) {
        return Err(JoinError::InvalidSsid);
    }
    Ok(())
}

/// Check a passphrase: empty (open network) or 8..=64 bytes.
pub fn validate_passphrase(passphrase: &str) -> Result<(), JoinError> {
    if passphrase.is_empty() {
        return Ok(());
    }
    if passphrase.len() < 8 || passphrase.len() > MAX_PASSPHRASE_LEN {
        return Err(JoinError::InvalidPassphrase);
    }
    Ok(())
}

/// Run the boot-time join: scan, connect, report.
///
/// Scan failure is logged and ignored. Any connect failure is returned.
pub fn join<W: WifiInterface>(wifi: &mut W, params: &JoinParams) -> Result<(), JoinError> {
    validate_ssid(&params.ssid)?;
    validate_passphrase(&params.passphrase)?;

    match wifi.scan() {
        Ok(networks) => {
            info!("{} networks available", networks.len());
            for ap in &networks {
                info!("Network: {} RSSI: {}", ap.ssid, ap.rssi);
            }
        }
        Err(e) => warn!("scan failed: {}", e),
    }

    info!("Connecting to {}...", params.ssid);
    wifi.connect(&params.ssid, &params.passphrase, params.security)?;

    info!("Success");
    report_link(wifi);
    Ok(())
}

fn report_link<W: WifiInterface>(wifi: &W) {
    match wifi.mac_address() {
        Some(mac) => info!("MAC: {}", mac),
        None => info!("MAC: unknown"),
    }
    match wifi.ip_address() {
        Some(ip) => info!("IP: {}", ip),
        None => info!("IP: none"),
    }
    match wifi.netmask() {
        Some(mask) => info!("Netmask: {}", mask),
        None => info!("Netmask: none"),
    }
    match wifi.gateway() {
        Some(gw) => info!("Gateway: {}", gw),
        None => info!("Gateway: none"),
    }
    info!("RSSI: {}", wifi.rssi());
}
