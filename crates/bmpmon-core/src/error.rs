//! Error types for sensing, storage and the pipeline.

use chrono::{DateTime, Utc};

use crate::sampler::Channel;

/// Failure of a single physical read.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected chip id 0x{found:02x} (expected 0x{expected:02x})")]
    InvalidChipId { expected: u8, found: u8 },
    #[error("measurement not ready after {attempts} status polls")]
    Timeout { attempts: u32 },
    #[error("invalid sensor data: {0}")]
    InvalidData(&'static str),
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// One or more channel reads failed while taking a sample.
///
/// Carries every failed channel together with its cause. The partially
/// read values are discarded; no incomplete [`Reading`](crate::Reading) is
/// ever produced.
#[derive(Debug, thiserror::Error)]
#[error("sensor read failed: {}", describe(.failures))]
pub struct SensorReadFailure {
    failures: Vec<(Channel, SensorError)>,
}

impl SensorReadFailure {
    pub fn new(failures: Vec<(Channel, SensorError)>) -> Self {
        Self { failures }
    }

    /// The failed channels and their causes, in read order.
    pub fn failures(&self) -> &[(Channel, SensorError)] {
        &self.failures
    }

    /// Whether the given channel is among the failed reads.
    pub fn failed(&self, channel: Channel) -> bool {
        self.failures.iter().any(|(c, _)| *c == channel)
    }
}

fn describe(failures: &[(Channel, SensorError)]) -> String {
    failures
        .iter()
        .map(|(channel, err)| format!("{channel}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Durable store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("timestamp {0} cannot be stored as nanoseconds since the epoch")]
    TimestampOutOfRange(DateTime<Utc>),
}

/// Errors surfaced by the pipeline coordinator and its loops.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// `add` was called while the buffer already held `capacity` readings.
    #[error("buffer is full ({capacity} readings awaiting flush)")]
    BufferFull { capacity: usize },
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sensor(#[from] SensorReadFailure),
    #[error("pipeline is closed")]
    Closed,
    #[error("pipeline state lock poisoned")]
    Poisoned,
    #[error("reading channel closed")]
    ChannelClosed,
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
