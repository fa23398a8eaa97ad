//! Pipeline and sensor configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::sensors::Accuracy;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Settings for the buffered ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Readings held in memory before a flush is forced.
    pub capacity: usize,
    /// Time between samples.
    pub interval: Duration,
    /// Readings that may queue between the ingestion and serve loops.
    pub channel_capacity: usize,
    pub db_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            interval: Duration::from_secs(15 * 60),
            channel_capacity: 16,
            db_path: PathBuf::from("storage.sqlite3"),
        }
    }
}

impl PipelineConfig {
    /// Bound for the ingestion channel. Zero is raised to 1.
    pub fn channel_bound(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

/// Location of the BMP280 on the I2C bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    pub bus: u8,
    pub address: u8,
    /// Oversampling preset for each forced measurement.
    pub accuracy: Accuracy,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x77,
            accuracy: Accuracy::Standard,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid duration {0:?} (expected e.g. 100ms, 30s, 15m, 1h)")]
    InvalidDuration(String),
    #[error("invalid I2C address {0:?} (expected 0x03..=0x77)")]
    InvalidAddress(String),
    #[error("invalid accuracy {0:?} (expected ultra-low, low, standard, high or ultra-high)")]
    InvalidAccuracy(String),
}

/// Parse a duration like `100ms`, `30s`, `15m` or `1h`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1000)
    };

    let value: u64 = numeric
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(s.to_string()))?;
    let millis = value
        .checked_mul(multiplier)
        .filter(|&ms| ms > 0)
        .ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))?;

    Ok(Duration::from_millis(millis))
}

/// Parse a 7-bit I2C address given in hex (`0x77`) or decimal (`119`).
pub fn parse_address(s: &str) -> Result<u8, ConfigError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    match parsed {
        // 0x00-0x02 and 0x78-0x7F are reserved on the bus.
        Ok(addr) if (0x03..=0x77).contains(&addr) => Ok(addr),
        _ => Err(ConfigError::InvalidAddress(s.to_string())),
    }
}

/// Parse an oversampling preset name.
pub fn parse_accuracy(s: &str) -> Result<Accuracy, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "ultra-low" => Ok(Accuracy::UltraLowPower),
        "low" => Ok(Accuracy::LowPower),
        "standard" => Ok(Accuracy::Standard),
        "high" => Ok(Accuracy::HighResolution),
        "ultra-high" => Ok(Accuracy::UltraHighResolution),
        _ => Err(ConfigError::InvalidAccuracy(s.to_string())),
    }
}
