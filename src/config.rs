//! Cache configuration.

use std::time::Duration;

/// Default entry lifetime: 100 years, i.e. never expires in practice.
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Environment variable overriding [`CacheConfig::default_expiry`], in seconds.
pub const ENV_DEFAULT_EXPIRY_SECS: &str = "DAO_CACHE_DEFAULT_EXPIRY_SECS";

/// Environment variable setting [`CacheConfig::callback_timeout`], in milliseconds.
pub const ENV_CALLBACK_TIMEOUT_MS: &str = "DAO_CACHE_CALLBACK_TIMEOUT_MS";

/// Configuration for a [`Cache`](crate::Cache).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Expiry given to a table on activation.
    pub default_expiry: Duration,
    /// Upper bound on each hydrator/synchroniser invocation. `None` waits forever.
    pub callback_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            default_expiry: DEFAULT_CACHE_EXPIRY,
            callback_timeout: None,
        }
    }
}

impl CacheConfig {
    /// Build configuration from the environment.
    ///
    /// 1. `DAO_CACHE_DEFAULT_EXPIRY_SECS` (if set and valid)
    /// 2. `DAO_CACHE_CALLBACK_TIMEOUT_MS` (if set and valid)
    ///
    /// Unset or unparsable values keep the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = CacheConfig::default();

        if let Some(secs) = parse_env(&lookup, ENV_DEFAULT_EXPIRY_SECS) {
            config.default_expiry = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_env(&lookup, ENV_CALLBACK_TIMEOUT_MS) {
            config.callback_timeout = Some(Duration::from_millis(ms));
        }

        config
    }

    pub fn with_default_expiry(mut self, expiry: Duration) -> Self {
        self.default_expiry = expiry;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = Some(timeout);
        self
    }
}

fn parse_env(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}
