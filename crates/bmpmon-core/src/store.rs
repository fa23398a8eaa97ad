//! Durable store abstraction.
//!
//! The pipeline talks to persistence only through [`ReadingStore`], so the
//! buffer and flush logic stay independent of the backing database.

use crate::error::StoreError;
use crate::reading::Reading;

/// Append-only, chronologically ordered log of committed readings.
///
/// # Implementations
///
/// - [`SqliteStore`](crate::sqlite::SqliteStore): the production backend.
pub trait ReadingStore: Send {
    /// Append `readings` in order as one transaction.
    ///
    /// Either every reading is committed or none is; on error the store is
    /// left exactly as it was before the call.
    fn append_batch(&mut self, readings: &[Reading]) -> Result<(), StoreError>;

    /// The most recent `k` committed readings, oldest first.
    ///
    /// Returns fewer than `k` readings when the store holds fewer.
    fn query_recent(&self, k: usize) -> Result<Vec<Reading>, StoreError>;

    /// Number of committed readings.
    fn count(&self) -> Result<u64, StoreError>;

    /// Release the underlying resources.
    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
