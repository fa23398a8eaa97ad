//! Software sensor for machines without an I2C bus.
//!
//! Produces a slow random walk around room conditions. Individual channels
//! can be forced to fail, which is how the pipeline's error paths are driven
//! in tests and dry runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SensorError;
use crate::sampler::{Channel, Sensor};

use super::bmp280::{altitude_from_pressure, pa_to_mmhg};

const BASE_TEMPERATURE: f64 = 21.5;
const BASE_PRESSURE_PA: f64 = 100_650.0;
const TEMPERATURE_STEP: f64 = 0.05;
const PRESSURE_STEP_PA: f64 = 4.0;
const TEMPERATURE_SPAN: f64 = 5.0;
const PRESSURE_SPAN_PA: f64 = 1_500.0;

pub struct SimulatedSensor {
    rng: StdRng,
    temperature: f64,
    pressure_pa: f64,
    failing: Vec<Channel>,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic sequence for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            temperature: BASE_TEMPERATURE,
            pressure_pa: BASE_PRESSURE_PA,
            failing: Vec::new(),
        }
    }

    /// Make every read of `channel` fail with [`SensorError::Unavailable`].
    pub fn failing(mut self, channel: Channel) -> Self {
        if !self.failing.contains(&channel) {
            self.failing.push(channel);
        }
        self
    }

    fn check(&self, channel: Channel) -> Result<(), SensorError> {
        if self.failing.contains(&channel) {
            return Err(SensorError::Unavailable(format!(
                "simulated {channel} failure"
            )));
        }
        Ok(())
    }

    fn step_pressure(&mut self) -> f64 {
        let step = self.rng.random_range(-PRESSURE_STEP_PA..=PRESSURE_STEP_PA);
        self.pressure_pa = (self.pressure_pa + step).clamp(
            BASE_PRESSURE_PA - PRESSURE_SPAN_PA,
            BASE_PRESSURE_PA + PRESSURE_SPAN_PA,
        );
        self.pressure_pa
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for SimulatedSensor {
    fn name(&self) -> &str {
        "simulated"
    }

    fn read_temperature(&mut self) -> Result<f64, SensorError> {
        self.check(Channel::Temperature)?;
        let step = self.rng.random_range(-TEMPERATURE_STEP..=TEMPERATURE_STEP);
        self.temperature = (self.temperature + step).clamp(
            BASE_TEMPERATURE - TEMPERATURE_SPAN,
            BASE_TEMPERATURE + TEMPERATURE_SPAN,
        );
        Ok(self.temperature)
    }

    fn read_pressure(&mut self) -> Result<f64, SensorError> {
        self.check(Channel::Pressure)?;
        Ok(pa_to_mmhg(self.step_pressure()))
    }

    fn read_altitude(&mut self) -> Result<f64, SensorError> {
        self.check(Channel::Altitude)?;
        Ok(altitude_from_pressure(self.step_pressure()))
    }
}
