//! # bmpmon-core
//!
//! **Buffered barometric telemetry.**
//!
//! `bmpmon-core` samples a BMP280 pressure/temperature sensor on a fixed
//! interval, stages readings in a bounded in-memory buffer, and commits them
//! to SQLite in batches. Reads see one chronological sequence spanning the
//! store and the buffer.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bmpmon_core::{Pipeline, Sampler, SqliteStore, sensors::SimulatedSensor};
//!
//! let sampler = Arc::new(Sampler::new(Box::new(SimulatedSensor::new())));
//! let store = SqliteStore::open("storage.sqlite3").unwrap();
//! let pipeline = Pipeline::new(sampler, Box::new(store), 10);
//!
//! let reading = pipeline.peek().unwrap();
//! pipeline.add(reading).unwrap();
//! let recent = pipeline.fetch(10).unwrap();
//! println!("{} readings", recent.len());
//! pipeline.close().unwrap();
//! ```
//!
//! ## Architecture
//!
//! Sensor → Sampler → ingestion loop → channel → serve loop → Pipeline
//! (Buffer → flush → SQLite)
//!
//! - The ingestion loop samples on a timer and never touches the store.
//! - The serve loop is the only writer; it calls [`Pipeline::add`].
//! - [`Pipeline::fetch`] and [`Pipeline::peek`] may be called concurrently
//!   from any thread.

pub mod buffer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod reading;
pub mod sampler;
pub mod sensors;
pub mod sqlite;
pub mod store;

pub use buffer::Buffer;
pub use config::{
    ConfigError, PipelineConfig, SensorConfig, parse_accuracy, parse_address, parse_duration,
};
pub use error::{PipelineError, SensorError, SensorReadFailure, StoreError};
pub use ingest::{run_ingestion, serve};
pub use pipeline::{Pipeline, PipelineStatus};
pub use reading::Reading;
pub use sampler::{Channel, Sampler, Sensor};
pub use sqlite::SqliteStore;
pub use store::ReadingStore;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
