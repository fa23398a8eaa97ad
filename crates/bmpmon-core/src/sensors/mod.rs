//! Sensor implementations.
//!
//! - [`Bmp280`]: the Bosch BMP280 over any [`RegisterBus`].
//! - [`SimulatedSensor`]: random-walk values for hosts without the device.

pub mod bmp280;
pub mod i2c;
pub mod simulated;

pub use bmp280::{Accuracy, Bmp280, Calibration};
#[cfg(target_os = "linux")]
pub use i2c::I2cBus;
pub use i2c::RegisterBus;
pub use simulated::SimulatedSensor;

use crate::config::SensorConfig;
use crate::error::SensorError;
use crate::sampler::Sensor;

/// Open the BMP280 described by `config` on the local I2C bus.
#[cfg(target_os = "linux")]
pub fn open_bmp280(config: &SensorConfig) -> Result<Box<dyn Sensor>, SensorError> {
    let bus = I2cBus::open(config.bus, config.address)?;
    let name = format!("bmp280@{}:0x{:02x}", bus.bus(), bus.address());
    let sensor = Bmp280::with_accuracy(bus, name, config.accuracy)?;
    log::info!(
        "BMP280 ready on bus {} at 0x{:02x} ({:?})",
        config.bus,
        config.address,
        config.accuracy
    );
    Ok(Box::new(sensor))
}

#[cfg(not(target_os = "linux"))]
pub fn open_bmp280(config: &SensorConfig) -> Result<Box<dyn Sensor>, SensorError> {
    Err(SensorError::Unavailable(format!(
        "I2C bus {} requires Linux i2c-dev; use the simulated sensor instead",
        config.bus
    )))
}
