//! Input validation errors.

use thiserror::Error;

/// Rejected user input. Raised before anything reaches the settings store
/// or the conversion arithmetic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Input could not be parsed as a number.
    #[error("{field} must be a number, got {input:?}")]
    NotANumber { field: String, input: String },

    /// Rate is zero, negative or not finite.
    #[error("{field} must be a positive number, got {value}")]
    NonPositiveRate { field: String, value: f64 },

    /// Amount to convert is zero, negative or not finite.
    #[error("Amount must be a positive number, got {0}")]
    NonPositiveAmount(f64),

    /// Source and target currency are the same.
    #[error("Cannot convert {0} to itself")]
    SameCurrency(String),

    /// New admin password is blank.
    #[error("Password can't be empty")]
    EmptyPassword,

    /// New admin password and its confirmation differ.
    #[error("Passwords do not match")]
    PasswordMismatch,
}

impl ValidationError {
    /// Name of the offending input field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::NotANumber { field, .. }
            | ValidationError::NonPositiveRate { field, .. } => Some(field),
            ValidationError::NonPositiveAmount(_) => Some("amount"),
            ValidationError::EmptyPassword | ValidationError::PasswordMismatch => {
                Some("password")
            }
            ValidationError::SameCurrency(_) => None,
        }
    }
}

/// Result type alias for validation.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
