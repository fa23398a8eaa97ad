//! `bmpmon probe`: check that a BMP280 answers and dump its calibration.

use bmpmon_core::SensorConfig;

use super::CliResult;

#[cfg(target_os = "linux")]
pub fn run(config: SensorConfig) -> CliResult {
    use bmpmon_core::Sensor;
    use bmpmon_core::sensors::bmp280::CHIP_ID;
    use bmpmon_core::sensors::{Bmp280, I2cBus};

    let path = format!("/dev/i2c-{}", config.bus);
    println!("Probing {path} at 0x{:02x}\n", config.address);

    let bus = I2cBus::open(config.bus, config.address)
        .map_err(|e| format!("cannot open {path}: {e}"))?;
    let name = format!("bmp280@{}:0x{:02x}", bus.bus(), bus.address());
    let mut sensor = Bmp280::with_accuracy(bus, name, config.accuracy)?;
    println!("  \u{2705} chip id 0x{CHIP_ID:02x} ({})", sensor.name());

    let c = sensor.calibration();
    println!("  Calibration:");
    println!("    T1..T3  {:>6} {:>6} {:>6}", c.t1, c.t2, c.t3);
    println!("    P1..P3  {:>6} {:>6} {:>6}", c.p1, c.p2, c.p3);
    println!("    P4..P6  {:>6} {:>6} {:>6}", c.p4, c.p5, c.p6);
    println!("    P7..P9  {:>6} {:>6} {:>6}", c.p7, c.p8, c.p9);

    let temperature = sensor.read_temperature()?;
    let pressure = sensor.read_pressure()?;
    let altitude = sensor.read_altitude()?;
    println!("\n  Measurement ({:?} accuracy):", sensor.accuracy());
    println!("    temperature  {temperature:>8.2} °C");
    println!("    pressure     {pressure:>8.2} mmHg");
    println!("    altitude     {altitude:>8.1} m");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn run(config: SensorConfig) -> CliResult {
    bmpmon_core::sensors::open_bmp280(&config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_missing_bus_fails() {
        let config = SensorConfig {
            bus: 250,
            ..SensorConfig::default()
        };
        assert!(run(config).is_err());
    }
}
