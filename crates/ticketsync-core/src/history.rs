//! Bounded history of observed remaining-ticket counts

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::types::{remaining_from_value, HistoryPoint};
use chrono::Utc;
use serde_json::Value;
use std::collections::VecDeque;

/// FIFO log of remaining-ticket observations, oldest evicted first
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `capacity` points
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an observation. `None` is ignored.
    ///
    /// Returns whether a point was appended.
    pub fn append(&mut self, value: Option<u64>) -> bool {
        let Some(remaining) = value else {
            return false;
        };

        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(HistoryPoint {
            timestamp: Utc::now(),
            remaining,
        });
        true
    }

    /// Record an observation from raw JSON; non-numeric input is ignored
    pub fn append_json(&mut self, value: &Value) -> bool {
        self.append(remaining_from_value(value))
    }

    /// Points in observation order
    pub fn values(&self) -> Vec<HistoryPoint> {
        self.points.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    /// Most recent observation
    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
