//! Per-process timestamp source.
//!
//! Wall-clock time can step backwards (NTP adjustments), which would make
//! two messages sent in order display out of order. `MonotonicClock` never
//! hands out a value smaller than the last one it returned.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time, clamped to be no earlier than the previous reading.
    pub fn now(&self) -> DateTime<Utc> {
        self.stamp(|now| now)
    }

    /// Run `f` with the current reading while holding the clock. Whatever `f`
    /// does is ordered the same way as the readings it was handed.
    pub fn stamp<T>(&self, f: impl FnOnce(DateTime<Utc>) -> T) -> T {
        self.observe_with(Utc::now(), f)
    }

    fn observe_with<T>(&self, reading: DateTime<Utc>, f: impl FnOnce(DateTime<Utc>) -> T) -> T {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let stamped = match *last {
            Some(prev) if prev > reading => prev,
            _ => reading,
        };
        *last = Some(stamped);
        f(stamped)
    }

    #[cfg(test)]
    fn observe(&self, reading: DateTime<Utc>) -> DateTime<Utc> {
        self.observe_with(reading, |stamped| stamped)
    }
}
