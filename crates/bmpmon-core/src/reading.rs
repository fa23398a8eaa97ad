//! The reading value type.
//!
//! A [`Reading`] is one timestamped sample of the barometric sensor. It is
//! produced by the [`Sampler`](crate::sampler::Sampler), moved into the
//! pipeline buffer, and eventually persisted. Readings are never mutated
//! after construction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped barometric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Wall-clock time the sample completed (UTC).
    pub timestamp: DateTime<Utc>,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Pressure in millimetres of mercury.
    pub pressure: f64,
    /// Barometric altitude in metres, relative to standard sea-level pressure.
    pub altitude: f64,
    /// Time spent talking to the sensor to produce this sample.
    ///
    /// Not persisted; readings loaded from the store carry a zero latency.
    #[serde(rename = "elapsed_ms", with = "latency_ms")]
    pub sample_latency: Duration,
}

impl Reading {
    pub fn new(
        timestamp: DateTime<Utc>,
        temperature: f64,
        pressure: f64,
        altitude: f64,
        sample_latency: Duration,
    ) -> Self {
        Self {
            timestamp,
            temperature,
            pressure,
            altitude,
            sample_latency,
        }
    }

    /// Compare the persisted fields of two readings.
    ///
    /// Timestamps must match exactly; the scalar values must agree within
    /// `tolerance`. Sampling latency is ignored since it is not stored.
    pub fn approx_eq(&self, other: &Reading, tolerance: f64) -> bool {
        let close = |a: f64, b: f64| (a.is_nan() && b.is_nan()) || (a - b).abs() <= tolerance;
        self.timestamp == other.timestamp
            && close(self.temperature, other.temperature)
            && close(self.pressure, other.pressure)
            && close(self.altitude, other.altitude)
    }
}

/// Serialize a latency as fractional milliseconds.
mod latency_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(latency.as_nanos() as f64 / 1e6)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(de::Error::custom("elapsed_ms must be a finite, non-negative number"));
        }
        Ok(Duration::from_nanos((ms * 1e6).round() as u64))
    }
}
