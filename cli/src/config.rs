//! CLI configuration.

use std::path::PathBuf;
use std::time::Duration;

use somrate_common::{constants, DurationExt};
use somrate_fx::{default_endpoints, Endpoint, HttpFetcherConfig, LiveRateCacheConfig};

/// Runtime configuration, from the environment with built-in defaults.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// JSON file holding settings and the cached live rate.
    pub store_path: PathBuf,
    /// Age after which the live rate is refetched.
    pub max_age: chrono::Duration,
    /// Connect timeout per endpoint.
    pub connect_timeout: Duration,
    /// Read timeout per endpoint.
    pub read_timeout: Duration,
    /// Rate endpoints, tried in order.
    pub endpoints: Vec<Endpoint>,
    /// Emit logs as JSON lines.
    pub json_logs: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("somrate.json"),
            max_age: constants::default_max_age(),
            connect_timeout: constants::fetch_connect_timeout().as_std(),
            read_timeout: constants::fetch_read_timeout().as_std(),
            endpoints: default_endpoints(),
            json_logs: false,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unparsable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("SOMRATE_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }

        if let Some(max_age) = lookup("SOMRATE_MAX_AGE_SECS")
            .and_then(|s| s.trim().parse().ok())
            .and_then(chrono::Duration::try_seconds)
        {
            config.max_age = max_age;
        }

        if let Some(secs) = lookup("SOMRATE_CONNECT_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            config.connect_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = lookup("SOMRATE_READ_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            config.read_timeout = Duration::from_secs(secs);
        }

        if let Some(urls) = lookup("SOMRATE_ENDPOINTS") {
            config.endpoints = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(Endpoint::from_url)
                .collect();
        }

        if let Some(flag) = lookup("SOMRATE_LOG_JSON") {
            config.json_logs = matches!(flag.trim(), "1" | "true" | "yes");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.store_path.as_os_str().is_empty() {
            return Err("Store path cannot be empty".to_string());
        }

        if self.max_age <= chrono::Duration::zero() {
            return Err("Max age must be positive".to_string());
        }

        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err("Fetch timeouts must be positive".to_string());
        }

        if self.endpoints.is_empty() {
            return Err("At least one rate endpoint is required".to_string());
        }

        Ok(())
    }

    pub fn http(&self) -> HttpFetcherConfig {
        HttpFetcherConfig {
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            ..Default::default()
        }
    }

    pub fn cache(&self) -> LiveRateCacheConfig {
        LiveRateCacheConfig {
            max_age: self.max_age,
            ..Default::default()
        }
    }
}
