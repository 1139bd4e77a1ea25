//! Simulation clock: the replay cursor over the recording's time axis.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Invariant: `start <= current <= end`, and `current` never decreases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimClock {
    pub start:   Timestamp,
    pub current: Timestamp,
    pub end:     Timestamp,
}

impl SimClock {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, current: start, end: end.max(start) }
    }

    /// Advance by `delta`, clamped to the end of the recording.
    /// Returns the new time. Sub-second parts of `delta` are dropped.
    pub fn advance(&mut self, delta: Duration) -> Timestamp {
        let secs = i64::try_from(delta.as_secs()).unwrap_or(i64::MAX);
        self.current = self.current.saturating_add(secs).min(self.end);
        self.current
    }

    /// Seconds elapsed since the start of the replay.
    pub fn elapsed(&self) -> i64 {
        self.current - self.start
    }

    pub fn at_end(&self) -> bool {
        self.current >= self.end
    }
}
