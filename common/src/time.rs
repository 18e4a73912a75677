//! Time utilities and constants for somrate.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Timing constants.
pub mod constants {
    use super::Duration;

    /// Age after which a cached live rate is refreshed (6 hours).
    pub fn default_max_age() -> Duration {
        Duration::hours(6)
    }

    /// Connect timeout per rate endpoint (8 seconds).
    pub fn fetch_connect_timeout() -> Duration {
        Duration::seconds(8)
    }

    /// Read timeout per rate endpoint (8 seconds).
    pub fn fetch_read_timeout() -> Duration {
        Duration::seconds(8)
    }

    /// How often the background refresher checks staleness (15 minutes).
    pub fn refresh_check_interval() -> Duration {
        Duration::minutes(15)
    }
}

/// A timestamp, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Timestamp as epoch milliseconds, the persisted form.
pub fn to_epoch_millis(timestamp: Timestamp) -> i64 {
    timestamp.timestamp_millis()
}

/// Timestamp from epoch milliseconds. `None` if out of range.
pub fn from_epoch_millis(millis: i64) -> Option<Timestamp> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }

    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}
