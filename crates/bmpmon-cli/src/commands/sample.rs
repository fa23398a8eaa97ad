//! `bmpmon sample`: live readings straight from the sensor, nothing stored.

use std::time::Duration;

use bmpmon_core::SensorConfig;

use super::{CliResult, format_reading, make_sampler};

pub fn run(
    sensor: SensorConfig,
    simulate: bool,
    count: usize,
    interval: Duration,
    json: bool,
) -> CliResult {
    let sampler = make_sampler(sensor, simulate)?;
    if !json {
        println!("Sampling {} ({count} reading(s)):\n", sampler.name());
    }

    let mut failures = 0;
    let mut last_failure = None;
    for i in 0..count {
        if i > 0 {
            std::thread::sleep(interval);
        }
        match sampler.sample() {
            Ok(reading) if json => println!("{}", serde_json::to_string(&reading)?),
            Ok(reading) => println!("  {}", format_reading(&reading)),
            Err(failure) => {
                eprintln!("  {failure}");
                failures += 1;
                last_failure = Some(failure);
            }
        }
    }

    match last_failure {
        Some(failure) if failures == count => Err(failure.into()),
        _ => Ok(()),
    }
}
