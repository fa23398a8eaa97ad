//! Fixed-capacity write-back buffer.
//!
//! Holds readings that have been accepted by the pipeline but not yet
//! committed to the durable store. Insertion order is chronological order.
//! The buffer never grows past its capacity: a push on a full buffer hands
//! the reading back instead of evicting anything.

use crate::reading::Reading;

/// Ordered staging area for readings pending a flush.
#[derive(Debug)]
pub struct Buffer {
    readings: Vec<Reading>,
    capacity: usize,
}

impl Buffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.readings.len() >= self.capacity
    }

    /// Append a reading, or return it unchanged if the buffer is full.
    pub fn push(&mut self, reading: Reading) -> Result<(), Reading> {
        if self.is_full() {
            return Err(reading);
        }
        self.readings.push(reading);
        Ok(())
    }

    /// The newest `n` readings, oldest first. Returns everything if `n`
    /// exceeds the current length.
    pub fn tail(&self, n: usize) -> &[Reading] {
        let start = self.readings.len().saturating_sub(n);
        &self.readings[start..]
    }

    pub fn as_slice(&self) -> &[Reading] {
        &self.readings
    }

    /// Drop every buffered reading. Only called after a committed flush.
    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::reading;

    #[test]
    fn test_zero_capacity_is_raised() {
        let buf = Buffer::new(0);
        assert_eq!(buf.capacity(), 1);
    }

    #[test]
    fn test_push_until_full() {
        let mut buf = Buffer::new(3);
        for i in 0..3 {
            assert!(!buf.is_full());
            buf.push(reading(i)).unwrap();
        }
        assert!(buf.is_full());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_push_on_full_returns_reading_and_keeps_contents() {
        let mut buf = Buffer::new(2);
        buf.push(reading(0)).unwrap();
        buf.push(reading(1)).unwrap();

        let rejected = buf.push(reading(2)).unwrap_err();
        assert_eq!(rejected, reading(2));
        assert_eq!(buf.as_slice(), &[reading(0), reading(1)]);
    }

    #[test]
    fn test_tail_returns_newest_in_order() {
        let mut buf = Buffer::new(5);
        for i in 0..4 {
            buf.push(reading(i)).unwrap();
        }
        assert_eq!(buf.tail(2), &[reading(2), reading(3)]);
        assert_eq!(buf.tail(0), &[] as &[Reading]);
        assert_eq!(buf.tail(10).len(), 4);
    }

    #[test]
    fn test_clear_empties() {
        let mut buf = Buffer::new(2);
        buf.push(reading(0)).unwrap();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 2);
    }
}
