//! Deterministic software sensors.
//!
//! Used by the host binary and the benchmarks where no I2C bus exists. Values
//! drift slowly and wrap inside a plausible indoor range.

use super::{Barometer, Error, Hygrometer, SensorDevice, Thermometer};

/// Simulated humidity/temperature device.
#[derive(Debug, Clone)]
pub struct SimulatedHumidityTemperature {
    temperature: f32,
    humidity: f32,
    enabled: bool,
}

impl SimulatedHumidityTemperature {
    /// Identification register value reported by [`read_id`](SensorDevice::read_id).
    pub const ID: u8 = 0xBC;

    /// Start at room conditions.
    pub fn new() -> Self {
        Self {
            temperature: 21.0,
            humidity: 40.0,
            enabled: false,
        }
    }
}

impl Default for SimulatedHumidityTemperature {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDevice for SimulatedHumidityTemperature {
    type Error = Error;

    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Error> {
        self.enabled = true;
        Ok(())
    }

    fn read_id(&mut self) -> Result<u8, Error> {
        Ok(Self::ID)
    }
}

impl Thermometer for SimulatedHumidityTemperature {
    fn temperature(&mut self) -> Result<f32, Error> {
        if !self.enabled {
            return Err(Error::Unavailable);
        }
        self.temperature += 0.1;
        if self.temperature > 26.0 {
            self.temperature = 18.0;
        }
        Ok(self.temperature)
    }
}

impl Hygrometer for SimulatedHumidityTemperature {
    fn humidity(&mut self) -> Result<f32, Error> {
        if !self.enabled {
            return Err(Error::Unavailable);
        }
        self.humidity -= 0.25;
        if self.humidity < 30.0 {
            self.humidity = 55.0;
        }
        Ok(self.humidity)
    }
}

/// Simulated barometer.
#[derive(Debug, Clone)]
pub struct SimulatedBarometer {
    pressure: f32,
    enabled: bool,
}

impl SimulatedBarometer {
    /// Identification register value reported by [`read_id`](SensorDevice::read_id).
    pub const ID: u8 = 0xB1;

    /// Start at standard sea-level pressure.
    pub fn new() -> Self {
        Self {
            pressure: 1013.25,
            enabled: false,
        }
    }
}

impl Default for SimulatedBarometer {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDevice for SimulatedBarometer {
    type Error = Error;

    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Error> {
        self.enabled = true;
        Ok(())
    }

    fn read_id(&mut self) -> Result<u8, Error> {
        Ok(Self::ID)
    }
}

impl Barometer for SimulatedBarometer {
    fn pressure(&mut self) -> Result<f32, Error> {
        if !self.enabled {
            return Err(Error::Unavailable);
        }
        self.pressure += 0.05;
        if self.pressure > 1020.0 {
            self.pressure = 1005.0;
        }
        Ok(self.pressure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{EnvironmentSensors, SensorSource};

    #[test]
    fn unavailable_until_enabled() {
        let mut ht = SimulatedHumidityTemperature::new();
        assert_eq!(ht.temperature(), Err(Error::Unavailable));
    }

    #[test]
    fn stays_in_range() {
        let mut sensors = EnvironmentSensors::new(
            SimulatedHumidityTemperature::new(),
            SimulatedBarometer::new(),
        );
        let ids = sensors.init();
        assert_eq!(ids.hum_temp, Some(SimulatedHumidityTemperature::ID));

        for _ in 0..500 {
            let reading = sensors.sample();
            let t = reading.temperature.unwrap();
            let h = reading.humidity.unwrap();
            let p = reading.pressure.unwrap();
            assert!((18.0..=26.1).contains(&t));
            assert!((29.75..=55.0).contains(&h));
            assert!((1005.0..=1020.05).contains(&p));
        }
    }
}
