//! Password-gated settings editing.

use std::sync::Arc;

use tracing::{info, instrument};

use somrate_common::{AdminPassword, OfflineRates, Settings};
use somrate_store::SettingsStore;

use crate::cache::LiveRateCache;
use crate::error::FxResult;

/// An authenticated admin. Only obtainable through [`crate::RateEngine::login`].
pub struct AdminSession {
    store: Arc<SettingsStore>,
    cache: Arc<LiveRateCache>,
}

impl AdminSession {
    pub(crate) fn new(store: Arc<SettingsStore>, cache: Arc<LiveRateCache>) -> Self {
        Self { store, cache }
    }

    pub fn settings(&self) -> FxResult<Settings> {
        Ok(self.store.settings()?)
    }

    pub fn set_use_live_kgs_rate(&self, enabled: bool) -> FxResult<()> {
        self.store.set_use_live_kgs_rate(enabled)?;
        info!(enabled, "Live KGS rate toggled");
        Ok(())
    }

    pub fn save_offline_rates(&self, rates: OfflineRates) -> FxResult<()> {
        self.store.save_offline_rates(rates)?;
        info!(
            eur = rates.eur_per_usd(),
            rub = rates.rub_per_usd(),
            kgs = rates.kgs_per_usd(),
            "Offline rates saved"
        );
        Ok(())
    }

    /// Save the live flag and offline rates together.
    pub fn update(&self, use_live: bool, rates: OfflineRates) -> FxResult<()> {
        self.store.save_rate_settings(use_live, rates)?;
        info!(use_live, "Rate settings saved");
        Ok(())
    }

    /// Replace the admin password. Blank or unconfirmed passwords are rejected.
    pub fn change_password(&self, new: &str, confirm: &str) -> FxResult<()> {
        let password = AdminPassword::new(new, confirm)?;
        self.store.set_admin_password(password)?;
        info!("Admin password changed");
        Ok(())
    }

    /// Fetch a new live rate regardless of the cached one.
    #[instrument(skip(self))]
    pub async fn refresh_live_rate(&self) -> FxResult<f64> {
        self.cache.refresh(true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LiveRateCacheConfig;
    use crate::engine::RateEngine;
    use crate::error::FxError;
    use crate::fetcher::MockRateFetcher;
    use somrate_common::{from_epoch_millis, LiveRate, ValidationError};

    fn setup(fetcher: Arc<MockRateFetcher>) -> (RateEngine, AdminSession) {
        let store = Arc::new(SettingsStore::in_memory());
        let cache = Arc::new(LiveRateCache::new(
            store.clone(),
            fetcher,
            LiveRateCacheConfig::default(),
        ));
        let engine = RateEngine::new(store, cache);
        let session = engine.login("admin").unwrap();
        (engine, session)
    }

    #[test]
    fn test_update_writes_flag_and_rates() {
        let (engine, admin) = setup(Arc::new(MockRateFetcher::new("mock")));
        let rates = OfflineRates::parse("0.95", "100", "89.1").unwrap();

        admin.update(false, rates).unwrap();

        let settings = engine.settings().unwrap();
        assert!(!settings.use_live_kgs_rate);
        assert_eq!(settings.offline, rates);
    }

    #[test]
    fn test_toggle_and_offline_rates() {
        let (_engine, admin) = setup(Arc::new(MockRateFetcher::new("mock")));

        admin.set_use_live_kgs_rate(false).unwrap();
        admin
            .save_offline_rates(OfflineRates::new(1.0, 2.0, 3.0).unwrap())
            .unwrap();

        let settings = admin.settings().unwrap();
        assert!(!settings.use_live_kgs_rate);
        assert_eq!(settings.offline.kgs_per_usd(), 3.0);
    }

    #[test]
    fn test_change_password() {
        let (engine, admin) = setup(Arc::new(MockRateFetcher::new("mock")));

        let err = admin.change_password("new", "other").unwrap_err();
        assert!(matches!(
            err,
            FxError::Validation(ValidationError::PasswordMismatch)
        ));
        let err = admin.change_password("  ", "  ").unwrap_err();
        assert!(matches!(
            err,
            FxError::Validation(ValidationError::EmptyPassword)
        ));

        admin.change_password("hunter2", "hunter2").unwrap();
        assert!(matches!(
            engine.login("admin"),
            Err(FxError::InvalidPassword)
        ));
        assert!(engine.login("hunter2").is_ok());
    }

    #[tokio::test]
    async fn test_refresh_is_forced() {
        let fetcher = Arc::new(MockRateFetcher::with_rate("mock", 88.8));
        let (engine, admin) = setup(fetcher.clone());
        engine
            .store()
            .save_live_rate(&LiveRate::new(85.0, from_epoch_millis(0).unwrap()).unwrap())
            .unwrap();

        assert_eq!(admin.refresh_live_rate().await.unwrap(), 88.8);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(engine.live_rate().unwrap().unwrap().rate, 88.8);
    }
}
