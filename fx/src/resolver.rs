//! Rate table resolution and conversion arithmetic.

use std::collections::BTreeMap;

use somrate_common::{Currency, LiveRate, Settings, Timestamp};

/// Units of each currency per 1 USD. Always contains `USD -> 1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<Currency, f64>,
}

impl RateTable {
    /// Table holding only `USD -> 1.0`.
    pub fn new() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(Currency::usd(), 1.0);
        Self { rates }
    }

    /// Add or replace a per-USD rate. USD itself stays at 1.0.
    pub fn with_rate(mut self, currency: Currency, per_usd: f64) -> Self {
        if currency != Currency::usd() {
            self.rates.insert(currency, per_usd);
        }
        self
    }

    pub fn get(&self, currency: &Currency) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    /// Per-USD rate, with unknown currencies counting as 1.0.
    pub fn per_usd(&self, currency: &Currency) -> f64 {
        self.get(currency).unwrap_or(1.0)
    }

    pub fn contains(&self, currency: &Currency) -> bool {
        self.rates.contains_key(currency)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Entries in currency-code order.
    pub fn iter(&self) -> impl Iterator<Item = (&Currency, f64)> {
        self.rates.iter().map(|(currency, rate)| (currency, *rate))
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the KGS entry of a rate table came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KgsSource {
    /// The cached live rate, fetched at `updated_at`.
    Live { updated_at: Timestamp },
    /// Live rate is enabled but none has been fetched yet.
    OfflineFallback,
    /// Live rate is disabled.
    Offline,
}

/// Where the KGS rate comes from for these settings and cache state.
pub fn kgs_source(settings: &Settings, live: Option<&LiveRate>) -> KgsSource {
    match (settings.use_live_kgs_rate, live) {
        (true, Some(live)) => KgsSource::Live {
            updated_at: live.updated_at,
        },
        (true, None) => KgsSource::OfflineFallback,
        (false, _) => KgsSource::Offline,
    }
}

/// Build the rate table for the current settings and cached live rate.
///
/// KGS comes from the live rate when it is enabled and present; EUR and RUB
/// always come from the offline settings.
pub fn effective_table(settings: &Settings, live: Option<&LiveRate>) -> RateTable {
    let kgs_per_usd = match (settings.use_live_kgs_rate, live) {
        (true, Some(live)) => live.rate,
        _ => settings.offline.kgs_per_usd(),
    };

    RateTable::new()
        .with_rate(Currency::eur(), settings.offline.eur_per_usd())
        .with_rate(Currency::rub(), settings.offline.rub_per_usd())
        .with_rate(Currency::kgs(), kgs_per_usd)
}

/// Factor turning an amount in `from` into an amount in `to`.
///
/// A currency missing from the table counts as 1.0 per USD instead of
/// failing the conversion.
pub fn conversion_rate(from: &Currency, to: &Currency, table: &RateTable) -> f64 {
    table.per_usd(to) / table.per_usd(from)
}

/// Convert `amount` from one currency to another. No rounding.
pub fn convert(amount: f64, from: &Currency, to: &Currency, table: &RateTable) -> f64 {
    amount * conversion_rate(from, to, table)
}

/// A computed conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Input amount.
    pub amount: f64,
    pub from: Currency,
    pub to: Currency,
    /// Factor applied.
    pub rate: f64,
    /// Output amount, unrounded.
    pub result: f64,
}

impl Conversion {
    /// Run a conversion against a rate table.
    pub fn compute(amount: f64, from: Currency, to: Currency, table: &RateTable) -> Self {
        let rate = conversion_rate(&from, &to, table);
        Self {
            amount,
            result: amount * rate,
            from,
            to,
            rate,
        }
    }

    /// Whether this conversion is between USD and KGS, in either direction.
    pub fn is_usd_kgs(&self) -> bool {
        let usd = Currency::usd();
        let kgs = Currency::kgs();
        (self.from == usd && self.to == kgs) || (self.from == kgs && self.to == usd)
    }
}
