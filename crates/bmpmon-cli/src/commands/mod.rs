pub mod fetch;
pub mod probe;
pub mod run;
pub mod sample;

use std::sync::Arc;

use bmpmon_core::sensors::{self, SimulatedSensor};
use bmpmon_core::{Reading, Sampler, Sensor, SensorConfig, SensorError};

pub type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Build the sampler for the configured device, or a simulated one.
pub fn make_sampler(config: SensorConfig, simulate: bool) -> Result<Arc<Sampler>, SensorError> {
    let sensor: Box<dyn Sensor> = if simulate {
        log::info!("using simulated sensor");
        Box::new(SimulatedSensor::new())
    } else {
        sensors::open_bmp280(&config)?
    };
    Ok(Arc::new(Sampler::new(sensor)))
}

/// One human-readable line per reading.
pub fn format_reading(reading: &Reading) -> String {
    format!(
        "{}  {:>7.2} °C  {:>7.2} mmHg  {:>8.1} m  ({:.1} ms)",
        reading.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        reading.temperature,
        reading.pressure,
        reading.altitude,
        reading.sample_latency.as_secs_f64() * 1000.0,
    )
}
