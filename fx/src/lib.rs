//! somrate FX Engine
//!
//! Decides which USD/KGS rate is authoritative and converts between the
//! supported currencies.
//!
//! # Features
//!
//! - Live USD/KGS rate fetched from an ordered list of endpoints, first
//!   success wins
//! - Persistent cache of the live rate with staleness checks
//! - Rate table combining the live rate with admin-configured offline rates
//! - Password-gated admin session for editing settings
//!
//! # Example
//!
//! ```rust,ignore
//! use somrate_fx::{FallbackRateFetcher, LiveRateCache, RateEngine};
//!
//! let fetcher = Arc::new(FallbackRateFetcher::http(default_endpoints(), HttpFetcherConfig::default())?);
//! let cache = Arc::new(LiveRateCache::new(store.clone(), fetcher, LiveRateCacheConfig::default()));
//! let engine = RateEngine::new(store, cache);
//!
//! engine.prepare().await;
//! let conversion = engine.convert(100.0, &Currency::usd(), &Currency::kgs())?;
//! ```

pub mod admin;
pub mod cache;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod refresher;
pub mod resolver;

pub use admin::AdminSession;
pub use cache::{LiveRateCache, LiveRateCacheConfig, RefreshStats};
pub use engine::RateEngine;
pub use error::{FxError, FxResult};
pub use fetcher::{
    default_endpoints, Endpoint, EndpointFetcher, FallbackRateFetcher, HttpFetcherConfig,
    RateFetcher,
};
pub use refresher::spawn_periodic_refresh;
pub use resolver::{
    conversion_rate, convert, effective_table, kgs_source, Conversion, KgsSource, RateTable,
};

#[cfg(any(test, feature = "test-utils"))]
pub use fetcher::MockRateFetcher;
