//! The cached live USD/KGS rate.

use chrono::Duration;

use crate::error::ValidationResult;
use crate::settings::ensure_positive;
use crate::time::Timestamp;

/// Last successfully fetched USD/KGS rate and when it was fetched.
///
/// Rate and timestamp only ever exist together; "no live rate yet" is
/// `Option<LiveRate>::None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveRate {
    /// KGS per 1 USD, strictly positive.
    pub rate: f64,
    /// When the rate was fetched.
    pub updated_at: Timestamp,
}

impl LiveRate {
    /// Create a live rate, rejecting non-positive values.
    pub fn new(rate: f64, updated_at: Timestamp) -> ValidationResult<Self> {
        Ok(Self {
            rate: ensure_positive("live_usd_kgs_rate", rate)?,
            updated_at,
        })
    }

    /// Age of the rate at `now`. Negative if the clock went backwards.
    pub fn age(&self, now: Timestamp) -> Duration {
        now - self.updated_at
    }

    /// USD per 1 KGS.
    pub fn inverse(&self) -> f64 {
        1.0 / self.rate
    }

    /// Whether this rate is older than `max_age` at `now`.
    pub fn is_stale(&self, max_age: Duration, now: Timestamp) -> bool {
        self.age(now) > max_age
    }
}

/// Staleness of an optional cached rate: a missing rate is always stale.
pub fn is_stale(live: Option<&LiveRate>, max_age: Duration, now: Timestamp) -> bool {
    match live {
        Some(live) => live.is_stale(max_age, now),
        None => true,
    }
}
