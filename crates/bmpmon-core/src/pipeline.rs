//! Buffered write-back coordinator.
//!
//! [`Pipeline`] owns the in-memory [`Buffer`] and the durable store behind a
//! single lock. Readings enter through [`Pipeline::add`], are committed in
//! batches by [`Pipeline::flush`], and are read back through
//! [`Pipeline::fetch`], which stitches stored and buffered readings into one
//! chronological sequence.
//!
//! # Flush discipline
//!
//! - A flush appends every buffered reading in one store transaction and
//!   clears the buffer only after the commit succeeds.
//! - A failed flush leaves both the buffer and the store untouched, so the
//!   next flush retries the same batch.
//! - `add` on a full buffer fails with [`PipelineError::BufferFull`] rather
//!   than evicting anything.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::buffer::Buffer;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, SensorReadFailure};
use crate::reading::Reading;
use crate::sampler::Sampler;
use crate::sqlite::SqliteStore;
use crate::store::ReadingStore;

/// Snapshot of the pipeline for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub buffered: usize,
    pub capacity: usize,
    /// Committed rows; `None` once the pipeline is closed.
    pub stored: Option<u64>,
    pub flushes: u64,
    pub last_flush: Option<DateTime<Utc>>,
    pub closed: bool,
}

struct PipelineState {
    buffer: Buffer,
    /// `None` after close.
    store: Option<Box<dyn ReadingStore>>,
    flushes: u64,
    last_flush: Option<DateTime<Utc>>,
}

impl PipelineState {
    fn store(&self) -> Result<&dyn ReadingStore, PipelineError> {
        self.store.as_deref().ok_or(PipelineError::Closed)
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        let store = self.store.as_mut().ok_or(PipelineError::Closed)?;
        if self.buffer.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        store.append_batch(self.buffer.as_slice())?;
        let n = self.buffer.len();
        self.buffer.clear();
        self.flushes += 1;
        self.last_flush = Some(Utc::now());
        log::debug!("flushed {n} readings in {:?}", start.elapsed());
        Ok(())
    }
}

/// Coordinates sampling, buffering and persistence of readings.
///
/// Intended to be shared as `Arc<Pipeline>`: a single serve task calls
/// [`add`](Self::add) while any number of readers call
/// [`fetch`](Self::fetch), [`peek`](Self::peek) and [`status`](Self::status).
/// All methods block; async callers should use `spawn_blocking`.
pub struct Pipeline {
    sampler: Arc<Sampler>,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    /// A capacity of zero is raised to one.
    pub fn new(sampler: Arc<Sampler>, store: Box<dyn ReadingStore>, capacity: usize) -> Self {
        Self {
            sampler,
            state: Mutex::new(PipelineState {
                buffer: Buffer::new(capacity),
                store: Some(store),
                flushes: 0,
                last_flush: None,
            }),
        }
    }

    /// Open the SQLite store named by `config` and build a pipeline over it.
    pub fn open(sampler: Arc<Sampler>, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let store = SqliteStore::open(&config.db_path)?;
        log::info!(
            "pipeline over {} (capacity {})",
            config.db_path.display(),
            config.capacity
        );
        Ok(Self::new(sampler, Box::new(store), config.capacity))
    }

    pub fn sampler(&self) -> &Arc<Sampler> {
        &self.sampler
    }

    fn lock(&self) -> Result<MutexGuard<'_, PipelineState>, PipelineError> {
        self.state.lock().map_err(|_| PipelineError::Poisoned)
    }

    /// Append a reading, flushing synchronously once the buffer fills.
    ///
    /// The reading stays buffered when that flush fails; the flush error is
    /// returned and the next `add` reports [`PipelineError::BufferFull`].
    pub fn add(&self, reading: Reading) -> Result<(), PipelineError> {
        let mut state = self.lock()?;
        state.store()?;

        let capacity = state.buffer.capacity();
        if state.buffer.push(reading).is_err() {
            return Err(PipelineError::BufferFull { capacity });
        }
        if state.buffer.is_full() {
            state.flush()?;
        }
        Ok(())
    }

    /// Commit every buffered reading as one transaction.
    ///
    /// Flushing an empty buffer succeeds without touching the store.
    pub fn flush(&self) -> Result<(), PipelineError> {
        self.lock()?.flush()
    }

    /// The most recent `n` readings, oldest first, across store and buffer.
    ///
    /// The store is only consulted when the buffer holds fewer than `n`
    /// readings. Returns fewer than `n` when less data exists.
    pub fn fetch(&self, n: usize) -> Result<Vec<Reading>, PipelineError> {
        let state = self.lock()?;
        let store = state.store()?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let buffered = state.buffer.len();
        if buffered >= n {
            return Ok(state.buffer.tail(n).to_vec());
        }

        let mut readings = store.query_recent(n - buffered)?;
        readings.extend_from_slice(state.buffer.as_slice());
        Ok(readings)
    }

    /// Take a live sample without buffering it.
    pub fn peek(&self) -> Result<Reading, SensorReadFailure> {
        self.sampler.sample()
    }

    pub fn status(&self) -> Result<PipelineStatus, PipelineError> {
        let state = self.lock()?;
        let stored = match state.store.as_deref() {
            Some(store) => Some(store.count()?),
            None => None,
        };
        Ok(PipelineStatus {
            buffered: state.buffer.len(),
            capacity: state.buffer.capacity(),
            stored,
            flushes: state.flushes,
            last_flush: state.last_flush,
            closed: state.store.is_none(),
        })
    }

    /// Flush what is buffered, then release the store.
    ///
    /// The store is released even when the final flush fails; that error is
    /// returned. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), PipelineError> {
        // Releasing the store matters more than a panicked writer's state.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.store.is_none() {
            return Ok(());
        }

        let flushed = state.flush();
        if let Err(e) = &flushed {
            log::error!(
                "final flush failed, {} buffered readings lost: {e}",
                state.buffer.len()
            );
        }

        let released = match state.store.take() {
            Some(store) => store.close().map_err(PipelineError::from),
            None => Ok(()),
        };
        log::info!("pipeline closed after {} flushes", state.flushes);
        flushed.and(released)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("closing pipeline on drop: {e}");
        }
    }
}
