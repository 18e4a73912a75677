//! Command implementations. Each returns the text to print.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Subcommand};
use tracing::{debug, info, warn};

use somrate_common::{
    format_amount, format_rate, parse_rate, validate_conversion, Currency, LiveRate, OfflineRates,
    Timestamp,
};
use somrate_fx::{
    spawn_periodic_refresh, Conversion, FallbackRateFetcher, KgsSource, LiveRateCache, RateEngine,
};
use somrate_store::{JsonFileStore, SettingsStore, StoreChange};

use crate::config::CliConfig;

/// Admin actions, all behind the admin password.
#[derive(Subcommand, Debug, Clone)]
pub enum AdminAction {
    /// Show the stored settings
    Show,
    /// Turn the live USD/KGS rate on or off
    SetLive {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Change offline rates; omitted ones keep their current value
    SetOffline {
        #[arg(long)]
        eur: Option<String>,
        #[arg(long)]
        rub: Option<String>,
        #[arg(long)]
        kgs: Option<String>,
        /// Also turn the live USD/KGS rate on or off in the same write
        #[arg(long, action = ArgAction::Set)]
        live: Option<bool>,
    },
    /// Change the admin password
    SetPassword {
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    /// Fetch a new live rate now
    Refresh,
}

/// Wire the store, fetchers, cache and engine from configuration.
pub fn build_engine(config: &CliConfig) -> anyhow::Result<Arc<RateEngine>> {
    let backend = JsonFileStore::open(&config.store_path)
        .with_context(|| format!("opening store {}", config.store_path.display()))?;
    let store = Arc::new(SettingsStore::new(Arc::new(backend)));

    let fetcher = FallbackRateFetcher::http(config.endpoints.clone(), config.http())?;
    let cache = Arc::new(LiveRateCache::new(
        store.clone(),
        Arc::new(fetcher),
        config.cache(),
    ));

    Ok(Arc::new(RateEngine::new(store, cache)))
}

pub async fn convert(
    engine: &RateEngine,
    amount: f64,
    from: &str,
    to: &str,
) -> anyhow::Result<String> {
    let from = Currency::new(from);
    let to = Currency::new(to);
    validate_conversion(amount, &from, &to)?;
    for currency in [&from, &to] {
        if !currency.is_supported() {
            warn!(currency = %currency, "Unsupported currency, treating it as 1 per USD");
        }
    }

    // Conversion still works from the offline rates if this fails.
    if let Err(e) = engine.prepare().await {
        debug!(error = %e, "Converting without a fresh live rate");
    }

    let conversion = engine.convert(amount, &from, &to)?;
    let mut out = describe_conversion(&conversion);
    if conversion.is_usd_kgs() {
        if let Some(note) = kgs_note(engine.kgs_source()?) {
            out.push('\n');
            out.push_str(&note);
        }
    }
    Ok(out)
}

pub fn rates(engine: &RateEngine) -> anyhow::Result<String> {
    let table = engine.rate_table()?;
    let mut lines: Vec<String> = table
        .iter()
        .map(|(currency, rate)| format!("1 USD = {} {}", format_rate(rate), currency))
        .collect();

    lines.push(match engine.kgs_source()? {
        KgsSource::Live { updated_at } => format!("KGS: live rate, updated {}", timestamp(updated_at)),
        KgsSource::OfflineFallback => "KGS: offline rate (live rate not loaded yet)".to_string(),
        KgsSource::Offline => "KGS: offline rate".to_string(),
    });
    Ok(lines.join("\n"))
}

pub async fn live(engine: &RateEngine, force: bool) -> anyhow::Result<String> {
    let result = if force {
        engine.refresh(true).await
    } else {
        engine.refresh_if_stale(engine.cache().max_age()).await
    };

    let (fetches, hits, failures) = engine.cache().stats().snapshot();
    debug!(fetches, hits, failures, "Live rate lookup finished");

    match (result, engine.live_rate()?) {
        (Ok(_), Some(live)) => Ok(describe_live(&live)),
        (Ok(rate), None) => Ok(format!("1 USD = {} KGS", format_rate(rate))),
        (Err(e), Some(live)) => {
            let label = if engine.cache().is_stale_now()? {
                "Last known rate (stale)"
            } else {
                "Last known rate"
            };
            Ok(format!(
                "Live rate unavailable: {}\n{}:\n{}",
                e,
                label,
                describe_live(&live)
            ))
        }
        (Err(e), None) => Ok(format!(
            "Live rate unavailable: {}\nNo live rate cached, offline rates apply",
            e
        )),
    }
}

pub async fn admin(engine: &RateEngine, password: &str, action: AdminAction) -> anyhow::Result<String> {
    let session = engine.login(password)?;

    let out = match action {
        AdminAction::Show => {
            let settings = session.settings()?;
            format!(
                "Use live KGS rate: {}\nOffline EUR per USD: {}\nOffline RUB per USD: {}\nOffline KGS per USD: {}",
                settings.use_live_kgs_rate,
                format_rate(settings.offline.eur_per_usd()),
                format_rate(settings.offline.rub_per_usd()),
                format_rate(settings.offline.kgs_per_usd()),
            )
        }
        AdminAction::SetLive { enabled } => {
            session.set_use_live_kgs_rate(enabled)?;
            format!("Use live KGS rate: {}", enabled)
        }
        AdminAction::SetOffline { eur, rub, kgs, live } => {
            let current = session.settings()?.offline;
            let pick = |field: &str, input: Option<String>, current: f64| match input {
                Some(input) => parse_rate(field, &input),
                None => Ok(current),
            };
            let rates = OfflineRates::new(
                pick("eur", eur, current.eur_per_usd())?,
                pick("rub", rub, current.rub_per_usd())?,
                pick("kgs", kgs, current.kgs_per_usd())?,
            )?;
            match live {
                Some(enabled) => {
                    session.update(enabled, rates)?;
                    format!("Offline rates saved\nUse live KGS rate: {}", enabled)
                }
                None => {
                    session.save_offline_rates(rates)?;
                    "Offline rates saved".to_string()
                }
            }
        }
        AdminAction::SetPassword { new, confirm } => {
            session.change_password(&new, &confirm)?;
            "Admin password changed".to_string()
        }
        AdminAction::Refresh => {
            let rate = session.refresh_live_rate().await?;
            format!("1 USD = {} KGS", format_rate(rate))
        }
    };
    Ok(out)
}

/// Refresh in the background and print every new live rate until Ctrl-C.
pub async fn watch(engine: Arc<RateEngine>, period: Duration) -> anyhow::Result<()> {
    let mut changes = engine.store().subscribe();
    let handle = spawn_periodic_refresh(engine.clone(), period);

    if let Some(live) = engine.live_rate()? {
        println!("{}", describe_live(&live));
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Some(StoreChange::LiveRate) => {
                    if let Some(live) = engine.live_rate()? {
                        println!("{}", describe_live(&live));
                    }
                }
                Some(StoreChange::Settings) => {}
                None => break,
            },
        }
    }

    handle.abort();

    let (fetches, hits, failures) = engine.cache().stats().snapshot();
    info!(fetches, hits, failures, "Stopped watching live rate");
    Ok(())
}

fn describe_conversion(conversion: &Conversion) -> String {
    format!(
        "{} = {}\n1 {} = {} {}",
        format_amount(conversion.amount, &conversion.from),
        format_amount(conversion.result, &conversion.to),
        conversion.from,
        format_rate(conversion.rate),
        conversion.to,
    )
}

fn describe_live(live: &LiveRate) -> String {
    format!(
        "1 USD = {} KGS\n1 KGS = {} USD\nUpdated: {}",
        format_rate(live.rate),
        format_rate(live.inverse()),
        timestamp(live.updated_at),
    )
}

fn kgs_note(source: KgsSource) -> Option<String> {
    match source {
        KgsSource::Live { updated_at } => {
            Some(format!("Live USD/KGS rate • {}", timestamp(updated_at)))
        }
        KgsSource::OfflineFallback => {
            Some("Live USD/KGS rate not loaded yet (offline fallback)".to_string())
        }
        KgsSource::Offline => None,
    }
}

fn timestamp(at: Timestamp) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use somrate_common::{from_epoch_millis, ValidationError};
    use somrate_fx::{FxError, LiveRateCacheConfig, MockRateFetcher};

    fn engine_with(fetcher: Arc<MockRateFetcher>) -> RateEngine {
        let store = Arc::new(SettingsStore::in_memory());
        let cache = Arc::new(LiveRateCache::new(
            store.clone(),
            fetcher,
            LiveRateCacheConfig::default(),
        ));
        RateEngine::new(store, cache)
    }

    #[tokio::test]
    async fn test_convert_with_live_rate() {
        let engine = engine_with(Arc::new(MockRateFetcher::with_rate("mock", 85.0)));

        let out = convert(&engine, 100.0, "usd", "kgs").await.unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "100.00 USD = 8500.00 KGS");
        assert_eq!(lines[1], "1 USD = 85 KGS");
        assert!(lines[2].starts_with("Live USD/KGS rate • "));
    }

    #[tokio::test]
    async fn test_convert_offline_fallback_note() {
        let engine = engine_with(Arc::new(MockRateFetcher::failing("mock")));

        let out = convert(&engine, 2.0, "KGS", "USD").await.unwrap();
        assert!(out.starts_with("2.00 KGS = 0.02 USD"));
        assert!(out.ends_with("Live USD/KGS rate not loaded yet (offline fallback)"));
    }

    #[tokio::test]
    async fn test_convert_cross_pair_has_no_note() {
        let engine = engine_with(Arc::new(MockRateFetcher::with_rate("mock", 85.0)));

        let out = convert(&engine, 1.0, "EUR", "RUB").await.unwrap();
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_convert_rejects_invalid_input() {
        let engine = engine_with(Arc::new(MockRateFetcher::with_rate("mock", 85.0)));

        let err = convert(&engine, 0.0, "USD", "KGS").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::NonPositiveAmount(0.0))
        );
        assert!(convert(&engine, 5.0, "usd", "USD").await.is_err());
    }

    #[tokio::test]
    async fn test_rates_listing() {
        let engine = engine_with(Arc::new(MockRateFetcher::new("mock")));
        engine.store().set_use_live_kgs_rate(false).unwrap();

        let out = rates(&engine).unwrap();
        assert_eq!(
            out,
            "1 USD = 0.92 EUR\n1 USD = 87.5 KGS\n1 USD = 91.5 RUB\n1 USD = 1 USD\nKGS: offline rate"
        );
    }

    #[tokio::test]
    async fn test_live_failure_shows_cached_rate() {
        let fetcher = Arc::new(MockRateFetcher::failing("mock"));
        let engine = engine_with(fetcher);
        let cached = LiveRate::new(80.0, from_epoch_millis(0).unwrap()).unwrap();
        engine.store().save_live_rate(&cached).unwrap();

        let out = live(&engine, true).await.unwrap();
        assert!(out.starts_with("Live rate unavailable: "));
        assert!(out.contains("Last known rate (stale):\n"));
        assert!(out.contains("1 USD = 80 KGS\n1 KGS = 0.0125 USD\nUpdated: 1970-01-01 00:00 UTC"));
        assert_eq!(engine.cache().stats().snapshot(), (0, 0, 1));
    }

    #[tokio::test]
    async fn test_live_failure_with_fresh_cached_rate() {
        let engine = engine_with(Arc::new(MockRateFetcher::failing("mock")));
        let cached = LiveRate::new(80.0, chrono::Utc::now()).unwrap();
        engine.store().save_live_rate(&cached).unwrap();

        let out = live(&engine, true).await.unwrap();
        assert!(out.contains("\nLast known rate:\n1 USD = 80 KGS"));
    }

    #[tokio::test]
    async fn test_live_success() {
        let engine = engine_with(Arc::new(MockRateFetcher::with_rate("mock", 87.3)));

        let out = live(&engine, false).await.unwrap();
        assert!(out.starts_with("1 USD = 87.3 KGS\n1 KGS = 0.0115 USD"));
    }

    #[tokio::test]
    async fn test_admin_actions() {
        let engine = engine_with(Arc::new(MockRateFetcher::with_rate("mock", 86.0)));

        let err = admin(&engine, "nope", AdminAction::Show).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FxError>(),
            Some(FxError::InvalidPassword)
        ));

        admin(
            &engine,
            "admin",
            AdminAction::SetOffline {
                eur: None,
                rub: Some("95".to_string()),
                kgs: None,
                live: None,
            },
        )
        .await
        .unwrap();
        let settings = engine.settings().unwrap();
        assert_eq!(settings.offline.rub_per_usd(), 95.0);
        assert_eq!(settings.offline.eur_per_usd(), 0.92);

        let err = admin(
            &engine,
            "admin",
            AdminAction::SetOffline {
                eur: Some("abc".to_string()),
                rub: None,
                kgs: None,
                live: Some(false),
            },
        )
        .await
        .unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());
        assert!(engine.settings().unwrap().use_live_kgs_rate);

        let out = admin(
            &engine,
            "admin",
            AdminAction::SetOffline {
                eur: None,
                rub: None,
                kgs: Some("88".to_string()),
                live: Some(false),
            },
        )
        .await
        .unwrap();
        assert_eq!(out, "Offline rates saved\nUse live KGS rate: false");
        let settings = engine.settings().unwrap();
        assert!(!settings.use_live_kgs_rate);
        assert_eq!(settings.offline.kgs_per_usd(), 88.0);
        assert_eq!(settings.offline.rub_per_usd(), 95.0);

        admin(&engine, "admin", AdminAction::SetLive { enabled: false })
            .await
            .unwrap();
        let out = admin(&engine, "admin", AdminAction::Show).await.unwrap();
        assert!(out.starts_with("Use live KGS rate: false"));

        let out = admin(&engine, "admin", AdminAction::Refresh).await.unwrap();
        assert_eq!(out, "1 USD = 86 KGS");

        admin(
            &engine,
            "admin",
            AdminAction::SetPassword {
                new: "letmein".to_string(),
                confirm: "letmein".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(admin(&engine, "admin", AdminAction::Show).await.is_err());
        assert!(admin(&engine, "letmein", AdminAction::Show).await.is_ok());
    }
}
