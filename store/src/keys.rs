//! Persisted key names.

pub const USE_LIVE_KGS_RATE: &str = "use_live_kgs_rate";
pub const OFFLINE_EUR_PER_USD: &str = "offline_eur_per_usd";
pub const OFFLINE_RUB_PER_USD: &str = "offline_rub_per_usd";
pub const OFFLINE_KGS_PER_USD: &str = "offline_kgs_per_usd";
pub const ADMIN_PASSWORD: &str = "admin_password";

pub const LIVE_USD_KGS_RATE: &str = "live_usd_kgs_rate";
/// Epoch milliseconds.
pub const LIVE_USD_KGS_UPDATED_AT: &str = "live_usd_kgs_updated_at";

/// Keys making up the settings record.
pub const SETTINGS_KEYS: [&str; 5] = [
    USE_LIVE_KGS_RATE,
    OFFLINE_EUR_PER_USD,
    OFFLINE_RUB_PER_USD,
    OFFLINE_KGS_PER_USD,
    ADMIN_PASSWORD,
];

/// Keys making up the live rate record.
pub const LIVE_RATE_KEYS: [&str; 2] = [LIVE_USD_KGS_RATE, LIVE_USD_KGS_UPDATED_AT];
