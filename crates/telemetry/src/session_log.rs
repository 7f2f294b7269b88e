//! Fixed-capacity ring buffer of recent selection results.
//!
//! Not synchronized on its own; the selection engine guards it together
//! with the active config.

use crate::TelemetryError;
use memwindow_core::SelectionResult;
use std::collections::VecDeque;

/// The N most recent selection results, oldest evicted first.
#[derive(Debug, Clone)]
pub struct SessionLog {
    entries: VecDeque<SelectionResult>,
    capacity: usize,
}

impl SessionLog {
    /// Create an empty log. A capacity of 0 is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a result, evicting the oldest entry when full.
    pub fn record(&mut self, result: SelectionResult) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(result);
    }

    /// Up to `count` entries, most recent first.
    pub fn recent(&self, count: usize) -> Vec<SelectionResult> {
        self.entries.iter().rev().take(count).cloned().collect()
    }

    /// Change the capacity, evicting the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        let overflow = self.entries.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.entries.drain(..overflow);
            tracing::debug!(evicted = overflow, capacity = self.capacity, "Session log shrunk");
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Pretty JSON of up to `count` recent entries, most recent first.
    pub fn export_json(&self, count: usize) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string_pretty(&self.recent(count))?)
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::with_capacity(100)
    }
}
