//! Bounded history of recent location samples.

use std::collections::VecDeque;

use crate::domain::{Coordinate, LocationSample};

/// Default number of samples kept.
pub const DEFAULT_CAPACITY: usize = 50;

/// FIFO ring of the most recent samples, oldest first.
///
/// Owned by exactly one tracking session and only mutated from that
/// session's task, so `push` and `snapshot` never observe each other
/// half-done.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<LocationSample>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once over capacity.
    pub fn push(&mut self, sample: LocationSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Coordinates oldest-first, for drawing a breadcrumb trail.
    pub fn snapshot(&self) -> Vec<Coordinate> {
        self.samples.iter().map(|s| s.coordinate).collect()
    }

    pub fn latest(&self) -> Option<&LocationSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocationSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(i: usize) -> LocationSample {
        let coord = Coordinate::new(i as f64 * 0.01, 0.0).unwrap();
        LocationSample::new(coord, at(i as i64))
    }

    #[test]
    fn starts_empty() {
        let buf = HistoryBuffer::default();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 50);
        assert!(buf.snapshot().is_empty());
        assert!(buf.latest().is_none());
    }

    #[test]
    fn keeps_order() {
        let mut buf = HistoryBuffer::default();
        for i in 0..3 {
            buf.push(sample(i));
        }
        let snap = buf.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0], sample(0).coordinate);
        assert_eq!(snap[2], sample(2).coordinate);
        assert_eq!(buf.latest(), Some(&sample(2)));
    }

    #[test]
    fn evicts_first_after_51_pushes() {
        let mut buf = HistoryBuffer::default();
        for i in 0..51 {
            buf.push(sample(i));
        }

        assert_eq!(buf.len(), 50);
        assert!(!buf.iter().any(|s| *s == sample(0)));
        assert!(buf.iter().any(|s| *s == sample(50)));
        assert_eq!(buf.snapshot()[0], sample(1).coordinate);
    }

    #[test]
    fn zero_capacity_keeps_one() {
        let mut buf = HistoryBuffer::new(0);
        buf.push(sample(0));
        buf.push(sample(1));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.latest(), Some(&sample(1)));
    }

    #[test]
    fn clear_empties() {
        let mut buf = HistoryBuffer::new(5);
        buf.push(sample(0));
        buf.clear();
        assert!(buf.is_empty());
    }
}
