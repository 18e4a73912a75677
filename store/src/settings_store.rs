//! Typed access to settings and the cached live rate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use somrate_common::{
    ensure_positive, from_epoch_millis, to_epoch_millis, AdminPassword, LiveRate, OfflineRates,
    Settings, DEFAULT_ADMIN_PASSWORD, DEFAULT_EUR_PER_USD, DEFAULT_KGS_PER_USD,
    DEFAULT_RUB_PER_USD,
};

use crate::backend::{KeyValueStore, MemoryStore};
use crate::error::StoreResult;
use crate::keys;

/// What a write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Settings,
    LiveRate,
}

/// Typed settings store over a [`KeyValueStore`] backend.
///
/// Missing or malformed keys read as their defaults. Subscribers get a
/// [`StoreChange`] after every successful write.
pub struct SettingsStore {
    backend: Arc<dyn KeyValueStore>,
    subscribers: DashMap<u64, mpsc::UnboundedSender<StoreChange>>,
    next_subscriber: AtomicU64,
}

impl SettingsStore {
    /// Create a settings store over the given backend.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            subscribers: DashMap::new(),
            next_subscriber: AtomicU64::new(0),
        }
    }

    /// Settings store backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Current settings, defaults filled in.
    pub fn settings(&self) -> StoreResult<Settings> {
        let values = self.backend.get_many(&keys::SETTINGS_KEYS)?;
        let [use_live, eur, rub, kgs, password]: [Option<Value>; 5] = values
            .try_into()
            .unwrap_or_else(|_| Default::default());

        let offline = OfflineRates::new(
            read_rate(keys::OFFLINE_EUR_PER_USD, eur, DEFAULT_EUR_PER_USD),
            read_rate(keys::OFFLINE_RUB_PER_USD, rub, DEFAULT_RUB_PER_USD),
            read_rate(keys::OFFLINE_KGS_PER_USD, kgs, DEFAULT_KGS_PER_USD),
        )
        .unwrap_or_default();

        Ok(Settings {
            use_live_kgs_rate: read_bool(keys::USE_LIVE_KGS_RATE, use_live, true),
            offline,
            admin_password: read_password(password),
        })
    }

    /// Cached live rate, if both halves are present and valid.
    pub fn live_rate(&self) -> StoreResult<Option<LiveRate>> {
        let values = self.backend.get_many(&keys::LIVE_RATE_KEYS)?;
        let [rate, updated_at]: [Option<Value>; 2] =
            values.try_into().unwrap_or_else(|_| Default::default());

        let live = match (rate, updated_at) {
            (None, None) => None,
            (Some(rate), Some(updated_at)) => {
                let rate = rate.as_f64();
                let updated_at = updated_at.as_i64().and_then(from_epoch_millis);
                match (rate, updated_at) {
                    (Some(rate), Some(updated_at)) => LiveRate::new(rate, updated_at).ok(),
                    _ => None,
                }
            }
            _ => None,
        };

        if live.is_none() {
            debug!("No usable live rate in store");
        }
        Ok(live)
    }

    pub fn set_use_live_kgs_rate(&self, enabled: bool) -> StoreResult<()> {
        self.write(
            StoreChange::Settings,
            vec![(keys::USE_LIVE_KGS_RATE.to_string(), json!(enabled))],
        )
    }

    pub fn save_offline_rates(&self, rates: OfflineRates) -> StoreResult<()> {
        self.write(StoreChange::Settings, offline_entries(rates))
    }

    /// Write the live flag and the offline rates in one batch.
    pub fn save_rate_settings(&self, use_live: bool, rates: OfflineRates) -> StoreResult<()> {
        let mut entries = offline_entries(rates);
        entries.push((keys::USE_LIVE_KGS_RATE.to_string(), json!(use_live)));
        self.write(StoreChange::Settings, entries)
    }

    pub fn set_admin_password(&self, password: AdminPassword) -> StoreResult<()> {
        self.write(
            StoreChange::Settings,
            vec![(keys::ADMIN_PASSWORD.to_string(), json!(password.into_inner()))],
        )
    }

    /// Store a freshly fetched rate together with its timestamp.
    pub fn save_live_rate(&self, live: &LiveRate) -> StoreResult<()> {
        self.write(
            StoreChange::LiveRate,
            vec![
                (keys::LIVE_USD_KGS_RATE.to_string(), json!(live.rate)),
                (
                    keys::LIVE_USD_KGS_UPDATED_AT.to_string(),
                    json!(to_epoch_millis(live.updated_at)),
                ),
            ],
        )
    }

    /// Receive a notification after each successful write.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, tx);
        rx
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn write(&self, change: StoreChange, entries: Vec<(String, Value)>) -> StoreResult<()> {
        self.backend.set_all(entries)?;
        debug!(?change, "Store updated");
        self.notify(change);
        Ok(())
    }

    fn notify(&self, change: StoreChange) {
        // Receivers that were dropped get pruned here.
        self.subscribers.retain(|_, tx| tx.send(change).is_ok());
    }
}

fn offline_entries(rates: OfflineRates) -> Vec<(String, Value)> {
    vec![
        (keys::OFFLINE_EUR_PER_USD.to_string(), json!(rates.eur_per_usd())),
        (keys::OFFLINE_RUB_PER_USD.to_string(), json!(rates.rub_per_usd())),
        (keys::OFFLINE_KGS_PER_USD.to_string(), json!(rates.kgs_per_usd())),
    ]
}

fn read_bool(key: &str, value: Option<Value>, default: bool) -> bool {
    match value {
        None => default,
        Some(Value::Bool(b)) => b,
        Some(other) => {
            warn!(key, value = %other, "Ignoring non-boolean setting");
            default
        }
    }
}

fn read_rate(key: &str, value: Option<Value>, default: f64) -> f64 {
    let Some(value) = value else {
        return default;
    };
    match value.as_f64().map(|rate| ensure_positive(key, rate)) {
        Some(Ok(rate)) => rate,
        _ => {
            warn!(key, value = %value, "Ignoring invalid offline rate");
            default
        }
    }
}

fn read_password(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s,
        None => DEFAULT_ADMIN_PASSWORD.to_string(),
        Some(_) => {
            warn!(key = keys::ADMIN_PASSWORD, "Ignoring invalid admin password");
            DEFAULT_ADMIN_PASSWORD.to_string()
        }
    }
}
