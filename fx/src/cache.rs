//! Persistent live-rate cache with staleness checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use somrate_common::{constants, Clock, LiveRate, SystemClock, Timestamp};
use somrate_store::SettingsStore;

use crate::error::FxResult;
use crate::fetcher::RateFetcher;

/// Configuration for the live-rate cache.
#[derive(Debug, Clone)]
pub struct LiveRateCacheConfig {
    /// Age after which the cached rate counts as stale.
    pub max_age: Duration,
    /// Let concurrent refreshes share one fetch.
    pub coalesce_refreshes: bool,
}

impl Default for LiveRateCacheConfig {
    fn default() -> Self {
        Self {
            max_age: constants::default_max_age(),
            coalesce_refreshes: true,
        }
    }
}

/// Refresh counters.
#[derive(Debug, Default)]
pub struct RefreshStats {
    /// Refreshes that went to the network and stored a rate.
    pub network_fetches: AtomicU64,
    /// Refreshes answered from the cache without I/O.
    pub cache_hits: AtomicU64,
    /// Refreshes where every endpoint failed.
    pub failures: AtomicU64,
}

impl RefreshStats {
    fn record_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values as `(network_fetches, cache_hits, failures)`.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.network_fetches.load(Ordering::Relaxed),
            self.cache_hits.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}

/// The last fetched USD/KGS rate, persisted in the settings store.
///
/// A successful refresh stores rate and timestamp in one write. A failed
/// refresh leaves whatever was cached before untouched.
pub struct LiveRateCache {
    store: Arc<SettingsStore>,
    fetcher: Arc<dyn RateFetcher>,
    clock: Arc<dyn Clock>,
    config: LiveRateCacheConfig,
    refresh_gate: Mutex<()>,
    stats: RefreshStats,
}

impl LiveRateCache {
    /// Create a cache on the system clock.
    pub fn new(
        store: Arc<SettingsStore>,
        fetcher: Arc<dyn RateFetcher>,
        config: LiveRateCacheConfig,
    ) -> Self {
        Self::with_clock(store, fetcher, Arc::new(SystemClock), config)
    }

    /// Create a cache on a custom clock.
    pub fn with_clock(
        store: Arc<SettingsStore>,
        fetcher: Arc<dyn RateFetcher>,
        clock: Arc<dyn Clock>,
        config: LiveRateCacheConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            clock,
            config,
            refresh_gate: Mutex::new(()),
            stats: RefreshStats::default(),
        }
    }

    /// The cached live rate, if any.
    pub fn current(&self) -> FxResult<Option<LiveRate>> {
        Ok(self.store.live_rate()?)
    }

    /// True if nothing is cached or the cached rate is older than `max_age`.
    pub fn is_stale(&self, max_age: Duration, now: Timestamp) -> FxResult<bool> {
        let live = self.current()?;
        Ok(somrate_common::is_stale(live.as_ref(), max_age, now))
    }

    /// Staleness against the configured max age and the cache's clock.
    pub fn is_stale_now(&self) -> FxResult<bool> {
        self.is_stale(self.config.max_age, self.clock.now())
    }

    /// Cached rate if it is fresh, otherwise a forced refresh.
    pub async fn refresh_if_stale(&self, max_age: Duration) -> FxResult<f64> {
        let now = self.clock.now();
        match self.current()? {
            Some(live) if !live.is_stale(max_age, now) => {
                debug!(rate = live.rate, age_secs = live.age(now).num_seconds(), "Live rate is fresh");
                self.stats.record_hit();
                Ok(live.rate)
            }
            _ => self.refresh(true).await,
        }
    }

    /// Fetch a new rate unless `force` is false and one is already cached.
    #[instrument(skip(self), fields(fetcher = self.fetcher.name()))]
    pub async fn refresh(&self, force: bool) -> FxResult<f64> {
        if !force {
            if let Some(live) = self.current()? {
                debug!(rate = live.rate, "Using cached live rate");
                self.stats.record_hit();
                return Ok(live.rate);
            }
        }

        if !self.config.coalesce_refreshes {
            return self.fetch_and_store().await;
        }

        let before = self.current()?;
        let _gate = self.refresh_gate.lock().await;

        // Someone else stored a rate while we waited for the gate.
        if let Some(after) = self.current()? {
            if Some(after) != before {
                debug!(rate = after.rate, "Reusing rate from concurrent refresh");
                self.stats.record_hit();
                return Ok(after.rate);
            }
        }

        self.fetch_and_store().await
    }

    /// Max age this cache was configured with.
    pub fn max_age(&self) -> Duration {
        self.config.max_age
    }

    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    async fn fetch_and_store(&self) -> FxResult<f64> {
        let rate = match self.fetcher.fetch().await {
            Ok(rate) => rate,
            Err(e) => {
                self.stats.record_failure();
                warn!(error = %e, "Live rate refresh failed, keeping cached value");
                return Err(e);
            }
        };

        let live = LiveRate::new(rate, self.clock.now())?;
        self.store.save_live_rate(&live)?;
        self.stats.record_fetch();

        info!(rate, updated_at = %live.updated_at, "Live rate refreshed");
        Ok(rate)
    }
}
