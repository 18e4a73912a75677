//! somrate Common Types
//!
//! Shared types used across the somrate workspace: currency codes and
//! display rounding, the persisted settings and live-rate model, input
//! validation errors, and clock helpers.

pub mod currency;
pub mod error;
pub mod live_rate;
pub mod settings;
pub mod time;

pub use currency::*;
pub use error::*;
pub use live_rate::*;
pub use settings::*;
pub use time::*;
