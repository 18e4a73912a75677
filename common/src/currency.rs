//! Currency codes and display rounding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO 4217 currency code, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" => 3,
            _ => 2,
        }
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn rub() -> Self {
        Self::new("RUB")
    }

    pub fn kgs() -> Self {
        Self::new("KGS")
    }

    /// Currencies the converter offers, in display order.
    pub fn supported() -> [Currency; 4] {
        [Self::usd(), Self::eur(), Self::kgs(), Self::rub()]
    }

    /// Whether this is one of the currencies the converter offers.
    pub fn is_supported(&self) -> bool {
        Self::supported().contains(self)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Format an amount rounded to the currency's standard decimal places,
/// e.g. `8500.00 KGS`.
pub fn format_amount(value: f64, currency: &Currency) -> String {
    let places = currency.decimal_places();
    match Decimal::from_f64_retain(value) {
        Some(decimal) => format!(
            "{:.*} {}",
            places as usize,
            decimal.round_dp(places),
            currency
        ),
        None => format!("{:.2} {}", value, currency),
    }
}

/// Format an exchange rate with at most four decimal places and no
/// trailing zeros.
pub fn format_rate(rate: f64) -> String {
    match Decimal::from_f64_retain(rate) {
        Some(decimal) => decimal.round_dp(4).normalize().to_string(),
        None => format!("{:.4}", rate),
    }
}
