//! Environmental sensor sources.
//!
//! Sensor drivers are black boxes: they are initialised once, then polled for
//! calibrated floating-point values that may fail at any time. The agent never
//! stops because a sensor did; a failed read simply leaves that field of the
//! [`SensorReading`] unavailable.
//!
//! The stock source, [`EnvironmentSensors`], combines a humidity/temperature
//! device with a pressure device, the pairing found on common environmental
//! shields.

use core::fmt;

use log::{debug, info, warn};

/// Software sensors for hosts without hardware.
pub mod simulated;

/// Errors reported for a sensor or one of its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The device did not answer or reported a read failure.
    Unavailable,
    /// `init` or `enable` failed.
    InitFailed,
    /// The device returned NaN or an infinity.
    NotFinite,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unavailable => write!(f, "sensor unavailable"),
            Error::InitFailed => write!(f, "sensor initialisation failed"),
            Error::NotFinite => write!(f, "sensor returned a non-finite value"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Unavailable => defmt::write!(f, "Unavailable"),
            Error::InitFailed => defmt::write!(f, "InitFailed"),
            Error::NotFinite => defmt::write!(f, "NotFinite"),
        }
    }
}

/// Lifecycle common to every sensor device.
pub trait SensorDevice {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Configure the device.
    fn init(&mut self) -> Result<(), Self::Error>;
    /// Start measuring.
    fn enable(&mut self) -> Result<(), Self::Error>;
    /// Read the device identification register.
    fn read_id(&mut self) -> Result<u8, Self::Error>;
}

/// A device that measures temperature in degrees Celsius.
pub trait Thermometer: SensorDevice {
    /// Current temperature.
    fn temperature(&mut self) -> Result<f32, Self::Error>;
}

/// A device that measures relative humidity in percent.
pub trait Hygrometer: SensorDevice {
    /// Current relative humidity.
    fn humidity(&mut self) -> Result<f32, Self::Error>;
}

/// A device that measures barometric pressure in hPa.
pub trait Barometer: SensorDevice {
    /// Current pressure.
    fn pressure(&mut self) -> Result<f32, Self::Error>;
}

/// One sample of every environmental value. `None` marks a value that could
/// not be read this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: Option<f32>,
    /// Percent relative humidity.
    pub humidity: Option<f32>,
    /// Hectopascal.
    pub pressure: Option<f32>,
}

impl SensorReading {
    /// A reading with every value present.
    pub fn new(temperature: f32, humidity: f32, pressure: f32) -> Self {
        Self {
            temperature: Some(temperature),
            humidity: Some(humidity),
            pressure: Some(pressure),
        }
    }

    /// Number of values that are unavailable. A non-finite value counts as
    /// unavailable because it is never published.
    pub fn missing(&self) -> usize {
        [self.temperature, self.humidity, self.pressure]
            .iter()
            .filter(|v| !v.is_some_and(f32::is_finite))
            .count()
    }

    /// `true` when every value is present.
    pub fn is_complete(&self) -> bool {
        self.missing() == 0
    }
}

/// Identification registers read during initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorIds {
    /// Humidity/temperature device id.
    pub hum_temp: Option<u8>,
    /// Pressure device id.
    pub pressure: Option<u8>,
}

/// Whatever produces one [`SensorReading`] per cycle.
pub trait SensorSource {
    /// Bring the devices up. Failures are reported through the returned ids
    /// and never abort the agent.
    fn init(&mut self) -> SensorIds;

    /// Take one sample.
    fn sample(&mut self) -> SensorReading;
}

/// A humidity/temperature device plus a pressure device.
#[derive(Debug)]
pub struct EnvironmentSensors<HT, P> {
    hum_temp: HT,
    pressure: P,
}

impl<HT, P> EnvironmentSensors<HT, P>
where
    HT: Thermometer + Hygrometer,
    P: Barometer,
{
    /// Pair the two devices.
    pub fn new(hum_temp: HT, pressure: P) -> Self {
        Self { hum_temp, pressure }
    }

    /// Give the devices back.
    pub fn release(self) -> (HT, P) {
        (self.hum_temp, self.pressure)
    }
}

fn bring_up<D: SensorDevice>(device: &mut D, name: &str) -> Option<u8> {
    if let Err(e) = device.init().and_then(|()| device.enable()) {
        warn!("{} sensor init failed: {:?}", name, e);
        return None;
    }
    match device.read_id() {
        Ok(id) => {
            info!("{} sensor = 0x{:X}", name, id);
            Some(id)
        }
        Err(e) => {
            warn!("{} sensor id read failed: {:?}", name, e);
            None
        }
    }
}

/// Turn a driver result into an optional value, dropping failures and
/// non-finite numbers.
fn finite<E: fmt::Debug>(value: Result<f32, E>, name: &str) -> Option<f32> {
    match value {
        Ok(v) if v.is_finite() => Some(v),
        Ok(v) => {
            debug!("{} reading {} discarded", name, v);
            None
        }
        Err(e) => {
            debug!("{} unavailable: {:?}", name, e);
            None
        }
    }
}

impl<HT, P> SensorSource for EnvironmentSensors<HT, P>
where
    HT: Thermometer + Hygrometer,
    P: Barometer,
{
    fn init(&mut self) -> SensorIds {
        let pressure = bring_up(&mut self.pressure, "pressure");
        let hum_temp = bring_up(&mut self.hum_temp, "humidity and temperature");
        SensorIds { hum_temp, pressure }
    }

    fn sample(&mut self) -> SensorReading {
        SensorReading {
            temperature: finite(self.hum_temp.temperature(), "temperature"),
            humidity: finite(self.hum_temp.humidity(), "humidity"),
            pressure: finite(self.pressure.pressure(), "pressure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHt {
        temperature: Result<f32, Error>,
        humidity: Result<f32, Error>,
        init: Result<(), Error>,
    }

    impl SensorDevice for FixedHt {
        type Error = Error;
        fn init(&mut self) -> Result<(), Error> {
            self.init
        }
        fn enable(&mut self) -> Result<(), Error> {
            Ok(())
        }
        fn read_id(&mut self) -> Result<u8, Error> {
            Ok(0xBC)
        }
    }

    impl Thermometer for FixedHt {
        fn temperature(&mut self) -> Result<f32, Error> {
            self.temperature
        }
    }

    impl Hygrometer for FixedHt {
        fn humidity(&mut self) -> Result<f32, Error> {
            self.humidity
        }
    }

    struct FixedBaro(Result<f32, Error>);

    impl SensorDevice for FixedBaro {
        type Error = Error;
        fn init(&mut self) -> Result<(), Error> {
            Ok(())
        }
        fn enable(&mut self) -> Result<(), Error> {
            Ok(())
        }
        fn read_id(&mut self) -> Result<u8, Error> {
            Ok(0xB1)
        }
    }

    impl Barometer for FixedBaro {
        fn pressure(&mut self) -> Result<f32, Error> {
            self.0
        }
    }

    fn healthy_ht() -> FixedHt {
        FixedHt {
            temperature: Ok(21.43),
            humidity: Ok(38.2),
            init: Ok(()),
        }
    }

    #[test]
    fn samples_every_value() {
        let mut sensors = EnvironmentSensors::new(healthy_ht(), FixedBaro(Ok(1013.25)));
        let reading = sensors.sample();
        assert_eq!(reading, SensorReading::new(21.43, 38.2, 1013.25));
        assert!(reading.is_complete());
    }

    #[test]
    fn failed_value_is_unavailable() {
        let mut ht = healthy_ht();
        ht.humidity = Err(Error::Unavailable);
        let mut sensors = EnvironmentSensors::new(ht, FixedBaro(Ok(1013.25)));

        let reading = sensors.sample();

        assert_eq!(reading.humidity, None);
        assert_eq!(reading.temperature, Some(21.43));
        assert_eq!(reading.missing(), 1);
    }

    #[test]
    fn nan_is_unavailable() {
        let mut sensors = EnvironmentSensors::new(healthy_ht(), FixedBaro(Ok(f32::NAN)));
        assert_eq!(sensors.sample().pressure, None);
    }

    #[test]
    fn non_finite_values_count_as_missing() {
        let reading = SensorReading::new(f32::NAN, 38.2, f32::NEG_INFINITY);
        assert_eq!(reading.missing(), 2);
        assert!(!reading.is_complete());
    }

    #[test]
    fn init_reports_ids_and_tolerates_failures() {
        let mut ht = healthy_ht();
        ht.init = Err(Error::InitFailed);
        let mut sensors = EnvironmentSensors::new(ht, FixedBaro(Ok(1013.25)));

        let ids = sensors.init();

        assert_eq!(ids.pressure, Some(0xB1));
        assert_eq!(ids.hum_temp, None);
    }
}
