//! Sensor abstraction and the sampler that turns channel reads into readings.
//!
//! A [`Sensor`] exposes the three physical channels of a barometric sensor.
//! The [`Sampler`] owns one sensor, reads every channel, times the whole
//! exchange, and either returns a complete [`Reading`] or a
//! [`SensorReadFailure`] naming every channel that failed.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use crate::error::{SensorError, SensorReadFailure};
use crate::reading::Reading;

/// Physical quantity read from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temperature,
    Pressure,
    Altitude,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature => write!(f, "temperature"),
            Self::Pressure => write!(f, "pressure"),
            Self::Altitude => write!(f, "altitude"),
        }
    }
}

/// A barometric sensor device.
///
/// Each call performs an independent physical read; a failure in one call
/// says nothing about the next.
pub trait Sensor: Send {
    /// Short device identifier (e.g. `"bmp280@1:0x77"`).
    fn name(&self) -> &str;

    /// Temperature in degrees Celsius.
    fn read_temperature(&mut self) -> Result<f64, SensorError>;

    /// Pressure in millimetres of mercury.
    fn read_pressure(&mut self) -> Result<f64, SensorError>;

    /// Barometric altitude in metres.
    fn read_altitude(&mut self) -> Result<f64, SensorError>;
}

/// Produces one [`Reading`] per call from a shared sensor handle.
///
/// Thread-safe: concurrent callers are serialized on the device.
pub struct Sampler {
    name: String,
    sensor: Mutex<Box<dyn Sensor>>,
}

impl Sampler {
    pub fn new(sensor: Box<dyn Sensor>) -> Self {
        Self {
            name: sensor.name().to_string(),
            sensor: Mutex::new(sensor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read every channel and assemble a reading.
    ///
    /// All three channels are always attempted so the failure lists every
    /// broken channel, not just the first.
    pub fn sample(&self) -> Result<Reading, SensorReadFailure> {
        // The device handle carries no invariants a panicked reader could break.
        let mut sensor = self.sensor.lock().unwrap_or_else(PoisonError::into_inner);

        let start = Instant::now();
        let temperature = sensor.read_temperature();
        let pressure = sensor.read_pressure();
        let altitude = sensor.read_altitude();
        let elapsed = start.elapsed();
        drop(sensor);

        match (temperature, pressure, altitude) {
            (Ok(t), Ok(p), Ok(a)) => Ok(Reading::new(Utc::now(), t, p, a, elapsed)),
            (t, p, a) => {
                let failures = [
                    (Channel::Temperature, t.err()),
                    (Channel::Pressure, p.err()),
                    (Channel::Altitude, a.err()),
                ]
                .into_iter()
                .filter_map(|(channel, err)| err.map(|e| (channel, e)))
                .collect();
                Err(SensorReadFailure::new(failures))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SimulatedSensor;

    #[test]
    fn test_channel_display() {
        assert_eq!(Channel::Temperature.to_string(), "temperature");
        assert_eq!(Channel::Pressure.to_string(), "pressure");
        assert_eq!(Channel::Altitude.to_string(), "altitude");
    }

    #[test]
    fn test_sample_produces_complete_reading() {
        let sampler = Sampler::new(Box::new(SimulatedSensor::new()));
        let before = Utc::now();
        let reading = sampler.sample().unwrap();
        assert!(reading.timestamp >= before);
        assert!(reading.temperature.is_finite());
        assert!(reading.pressure > 600.0 && reading.pressure < 900.0);
        assert!(reading.altitude.is_finite());
    }

    #[test]
    fn test_partial_failure_discards_reading() {
        let sensor = SimulatedSensor::new().failing(Channel::Pressure);
        let sampler = Sampler::new(Box::new(sensor));
        let failure = sampler.sample().unwrap_err();
        assert!(failure.failed(Channel::Pressure));
        assert!(!failure.failed(Channel::Temperature));
    }

    #[test]
    fn test_every_failed_channel_reported() {
        let sensor = SimulatedSensor::new()
            .failing(Channel::Temperature)
            .failing(Channel::Altitude);
        let sampler = Sampler::new(Box::new(sensor));
        let failure = sampler.sample().unwrap_err();
        let channels: Vec<Channel> = failure.failures().iter().map(|(c, _)| *c).collect();
        assert_eq!(channels, vec![Channel::Temperature, Channel::Altitude]);
    }

    #[test]
    fn test_sampler_name_from_sensor() {
        let sampler = Sampler::new(Box::new(SimulatedSensor::new()));
        assert_eq!(sampler.name(), "simulated");
    }

    #[test]
    fn test_sampler_is_shareable() {
        let sampler = std::sync::Arc::new(Sampler::new(Box::new(SimulatedSensor::new())));
        std::thread::scope(|s| {
            for _ in 0..4 {
                let sampler = &sampler;
                s.spawn(move || {
                    for _ in 0..10 {
                        sampler.sample().unwrap();
                    }
                });
            }
        });
    }
}
