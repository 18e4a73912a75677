//! User-editable converter settings.

use crate::currency::Currency;
use crate::error::{ValidationError, ValidationResult};

/// Default offline EUR per USD.
pub const DEFAULT_EUR_PER_USD: f64 = 0.92;
/// Default offline RUB per USD.
pub const DEFAULT_RUB_PER_USD: f64 = 91.5;
/// Default offline KGS per USD.
pub const DEFAULT_KGS_PER_USD: f64 = 87.5;
/// Default admin password.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Fixed per-USD rates used when no live rate applies.
///
/// Every rate is finite and strictly positive; the only way to build one is
/// through [`OfflineRates::new`], so resolvers never see invalid values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfflineRates {
    eur_per_usd: f64,
    rub_per_usd: f64,
    kgs_per_usd: f64,
}

impl OfflineRates {
    /// Validate and build a set of offline rates.
    pub fn new(eur_per_usd: f64, rub_per_usd: f64, kgs_per_usd: f64) -> ValidationResult<Self> {
        Ok(Self {
            eur_per_usd: ensure_positive("eur_per_usd", eur_per_usd)?,
            rub_per_usd: ensure_positive("rub_per_usd", rub_per_usd)?,
            kgs_per_usd: ensure_positive("kgs_per_usd", kgs_per_usd)?,
        })
    }

    /// Parse the three rates from text fields.
    pub fn parse(eur: &str, rub: &str, kgs: &str) -> ValidationResult<Self> {
        Ok(Self {
            eur_per_usd: parse_rate("eur_per_usd", eur)?,
            rub_per_usd: parse_rate("rub_per_usd", rub)?,
            kgs_per_usd: parse_rate("kgs_per_usd", kgs)?,
        })
    }

    pub fn eur_per_usd(&self) -> f64 {
        self.eur_per_usd
    }

    pub fn rub_per_usd(&self) -> f64 {
        self.rub_per_usd
    }

    pub fn kgs_per_usd(&self) -> f64 {
        self.kgs_per_usd
    }
}

impl Default for OfflineRates {
    fn default() -> Self {
        Self {
            eur_per_usd: DEFAULT_EUR_PER_USD,
            rub_per_usd: DEFAULT_RUB_PER_USD,
            kgs_per_usd: DEFAULT_KGS_PER_USD,
        }
    }
}

/// Converter settings as persisted in the settings store.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Prefer the fetched USD/KGS rate over the offline one.
    pub use_live_kgs_rate: bool,
    /// Fallback rates.
    pub offline: OfflineRates,
    /// Password guarding the admin actions.
    pub admin_password: String,
}

impl Settings {
    /// Plain comparison against the stored admin password.
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.admin_password == candidate
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_live_kgs_rate: true,
            offline: OfflineRates::default(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

/// A new admin password that passed the blank and confirmation checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPassword(String);

impl AdminPassword {
    pub fn new(password: &str, confirmation: &str) -> ValidationResult<Self> {
        if password.trim().is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        if password != confirmation {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(Self(password.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Parse a rate typed by a user.
pub fn parse_rate(field: &str, input: &str) -> ValidationResult<f64> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber {
            field: field.to_string(),
            input: input.to_string(),
        })?;
    ensure_positive(field, value)
}

/// Reject rates that are zero, negative, NaN or infinite.
pub fn ensure_positive(field: &str, value: f64) -> ValidationResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::NonPositiveRate {
            field: field.to_string(),
            value,
        })
    }
}

/// Check that a conversion request is worth running: a positive amount
/// between two different currencies.
pub fn validate_conversion(amount: f64, from: &Currency, to: &Currency) -> ValidationResult<()> {
    if !(amount.is_finite() && amount > 0.0) {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    if from == to {
        return Err(ValidationError::SameCurrency(from.code().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.use_live_kgs_rate);
        assert_eq!(settings.offline.eur_per_usd(), 0.92);
        assert_eq!(settings.offline.rub_per_usd(), 91.5);
        assert_eq!(settings.offline.kgs_per_usd(), 87.5);
        assert_eq!(settings.admin_password, "admin");
    }

    #[test]
    fn test_verify_password() {
        let settings = Settings::default();
        assert!(settings.verify_password("admin"));
        assert!(!settings.verify_password("Admin"));
        assert!(!settings.verify_password(""));
    }

    #[test]
    fn test_offline_rates_reject_non_positive() {
        let err = OfflineRates::new(0.92, 0.0, 87.5).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonPositiveRate {
                field: "rub_per_usd".to_string(),
                value: 0.0
            }
        );
        assert!(OfflineRates::new(-1.0, 91.5, 87.5).is_err());
        assert!(OfflineRates::new(0.92, 91.5, f64::NAN).is_err());
        assert!(OfflineRates::new(0.92, f64::INFINITY, 87.5).is_err());
    }

    #[test]
    fn test_offline_rates_parse() {
        let rates = OfflineRates::parse("0.9", " 90 ", "88.25").unwrap();
        assert_eq!(rates.eur_per_usd(), 0.9);
        assert_eq!(rates.rub_per_usd(), 90.0);
        assert_eq!(rates.kgs_per_usd(), 88.25);

        let err = OfflineRates::parse("0.9", "abc", "88").unwrap_err();
        assert!(matches!(err, ValidationError::NotANumber { .. }));
        assert_eq!(err.field(), Some("rub_per_usd"));
    }

    #[test]
    fn test_admin_password_rules() {
        assert_eq!(
            AdminPassword::new("   ", "   "),
            Err(ValidationError::EmptyPassword)
        );
        assert_eq!(
            AdminPassword::new("secret", "secrets"),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(AdminPassword::new("secret", "secret").unwrap().as_str(), "secret");
    }

    #[test]
    fn test_validate_conversion() {
        assert!(validate_conversion(100.0, &Currency::usd(), &Currency::kgs()).is_ok());
        assert_eq!(
            validate_conversion(0.0, &Currency::usd(), &Currency::kgs()),
            Err(ValidationError::NonPositiveAmount(0.0))
        );
        assert_eq!(
            validate_conversion(5.0, &Currency::eur(), &Currency::new("eur")),
            Err(ValidationError::SameCurrency("EUR".to_string()))
        );
    }

    proptest! {
        #[test]
        fn positive_rates_always_validate(
            eur in 1e-6f64..1e6,
            rub in 1e-6f64..1e6,
            kgs in 1e-6f64..1e6,
        ) {
            let rates = OfflineRates::new(eur, rub, kgs).unwrap();
            prop_assert_eq!(rates.kgs_per_usd(), kgs);
        }

        #[test]
        fn non_positive_rates_never_validate(bad in -1e6f64..=0.0) {
            prop_assert!(OfflineRates::new(bad, 91.5, 87.5).is_err());
            prop_assert!(OfflineRates::new(0.92, 91.5, bad).is_err());
        }
    }
}
