//! SQLite reading store.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE sensor_log (
//!     time INTEGER NOT NULL,   -- Unix nanoseconds
//!     temperature FLOAT,
//!     altitude FLOAT,
//!     pressure FLOAT
//! );
//! CREATE INDEX sensor_time ON sensor_log(time);
//! ```
//!
//! Sampling latency is not persisted. NaN values are stored as NULL by
//! SQLite and read back as NaN.

use std::path::Path;
use std::time::Duration;

use chrono::DateTime;
use rusqlite::{Connection, params};

use crate::error::StoreError;
use crate::reading::Reading;
use crate::store::ReadingStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sensor_log (
    time INTEGER NOT NULL,
    temperature FLOAT,
    altitude FLOAT,
    pressure FLOAT
);

CREATE INDEX IF NOT EXISTS sensor_time ON sensor_log(time);
";

const INSERT: &str = "
INSERT INTO sensor_log (time, temperature, altitude, pressure)
VALUES (?1, ?2, ?3, ?4)
";

const FETCH_RECENT: &str = "
SELECT time, temperature, altitude, pressure FROM sensor_log
ORDER BY time DESC, rowid DESC
LIMIT ?1
";

const COUNT: &str = "SELECT COUNT(*) FROM sensor_log";

/// Upper bound on waiting for a competing writer's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`ReadingStore`].
///
/// Not `Sync`: the pipeline serializes access behind its own lock.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a file-backed store and ensure the schema exists.
    ///
    /// File databases run in WAL mode so readers in other processes see
    /// either the previous or the fully committed row set.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("opened {} (journal_mode={mode})", path.as_ref().display());
        Self::init(conn)
    }

    /// Create an in-memory store (for testing and dry runs).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn row_to_reading(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reading> {
        let nanos: i64 = row.get(0)?;
        let value = |idx: usize| -> rusqlite::Result<f64> {
            Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
        };
        Ok(Reading {
            timestamp: DateTime::from_timestamp_nanos(nanos),
            temperature: value(1)?,
            altitude: value(2)?,
            pressure: value(3)?,
            sample_latency: Duration::ZERO,
        })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ReadingStore for SqliteStore {
    fn append_batch(&mut self, readings: &[Reading]) -> Result<(), StoreError> {
        if readings.is_empty() {
            return Ok(());
        }

        // Dropping `tx` without commit rolls the whole batch back.
        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare_cached(INSERT)?;
            for reading in readings {
                let time = reading
                    .timestamp
                    .timestamp_nanos_opt()
                    .ok_or(StoreError::TimestampOutOfRange(reading.timestamp))?;
                insert.execute(params![
                    time,
                    reading.temperature,
                    reading.altitude,
                    reading.pressure
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query_recent(&self, k: usize) -> Result<Vec<Reading>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(k).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare_cached(FETCH_RECENT)?;
        let mut readings = stmt
            .query_map([limit], Self::row_to_reading)?
            .collect::<Result<Vec<_>, _>>()?;
        readings.reverse();
        Ok(readings)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row(COUNT, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}
