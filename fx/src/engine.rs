//! Main rate engine.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, instrument, warn};

use somrate_common::{Currency, LiveRate, Settings};
use somrate_store::SettingsStore;

use crate::admin::AdminSession;
use crate::cache::LiveRateCache;
use crate::error::{FxError, FxResult};
use crate::resolver::{effective_table, kgs_source, Conversion, KgsSource, RateTable};

/// The main rate engine.
///
/// Conversions only read the store. Network traffic happens in
/// [`RateEngine::prepare`] and the explicit refresh calls.
pub struct RateEngine {
    store: Arc<SettingsStore>,
    cache: Arc<LiveRateCache>,
}

impl RateEngine {
    /// Create an engine over a store and the cache built on it.
    pub fn new(store: Arc<SettingsStore>, cache: Arc<LiveRateCache>) -> Self {
        Self { store, cache }
    }

    pub fn settings(&self) -> FxResult<Settings> {
        Ok(self.store.settings()?)
    }

    pub fn live_rate(&self) -> FxResult<Option<LiveRate>> {
        self.cache.current()
    }

    /// Effective rate table for the current settings and cached rate.
    pub fn rate_table(&self) -> FxResult<RateTable> {
        let settings = self.settings()?;
        let live = self.live_rate()?;
        Ok(effective_table(&settings, live.as_ref()))
    }

    /// Where the KGS rate currently comes from.
    pub fn kgs_source(&self) -> FxResult<KgsSource> {
        let settings = self.settings()?;
        let live = self.live_rate()?;
        Ok(kgs_source(&settings, live.as_ref()))
    }

    /// Convert an amount using the current rate table.
    #[instrument(skip(self, from, to), fields(from = %from, to = %to))]
    pub fn convert(&self, amount: f64, from: &Currency, to: &Currency) -> FxResult<Conversion> {
        let table = self.rate_table()?;
        let conversion = Conversion::compute(amount, from.clone(), to.clone(), &table);

        debug!(
            rate = conversion.rate,
            result = conversion.result,
            "Conversion completed"
        );

        Ok(conversion)
    }

    /// Refresh the live rate if it is enabled and stale.
    ///
    /// Returns `None` when the live rate is disabled. Failures are logged and
    /// returned; the cached rate stays usable either way.
    pub async fn prepare(&self) -> FxResult<Option<f64>> {
        if !self.settings()?.use_live_kgs_rate {
            debug!("Live KGS rate disabled, skipping refresh");
            return Ok(None);
        }

        match self.cache.refresh_if_stale(self.cache.max_age()).await {
            Ok(rate) => Ok(Some(rate)),
            Err(e) => {
                warn!(error = %e, "Could not refresh live rate");
                Err(e)
            }
        }
    }

    /// Cached rate if younger than `max_age`, otherwise fetch.
    pub async fn refresh_if_stale(&self, max_age: Duration) -> FxResult<f64> {
        self.cache.refresh_if_stale(max_age).await
    }

    /// Fetch the live rate; without `force` a cached rate is returned as is.
    pub async fn refresh(&self, force: bool) -> FxResult<f64> {
        self.cache.refresh(force).await
    }

    pub fn cache(&self) -> &Arc<LiveRateCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.store
    }

    /// Open an admin session if `password` matches the stored one.
    pub fn login(&self, password: &str) -> FxResult<AdminSession> {
        if !self.settings()?.verify_password(password) {
            warn!("Rejected admin login");
            return Err(FxError::InvalidPassword);
        }

        info!("Admin session opened");
        Ok(AdminSession::new(self.store.clone(), self.cache.clone()))
    }
}
