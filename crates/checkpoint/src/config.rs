use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://checkpoint-api.solo.io/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DISABLE_VAR: &str = "CHECKPOINT_DISABLE";
pub const TIMEOUT_VAR: &str = "CHECKPOINT_TIMEOUT";
pub const URL_VAR: &str = "CHECKPOINT_URL";

/// Client configuration, fixed once a [`crate::Checkpoint`] is built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// When set, every operation is a no-op: no network, no file access
    pub disabled: bool,
    /// Base URL of the checkpoint service
    pub endpoint: String,
    /// Whole-request timeout for check and report calls
    pub timeout: Duration,
    /// Period of the background check started by `start`
    pub check_interval: Duration,
    /// Directory holding the signature file (platform config dir when unset)
    pub config_dir: Option<PathBuf>,
    /// Directory for per-product result caches (no caching when unset)
    pub cache_dir: Option<PathBuf>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            check_interval: DEFAULT_CHECK_INTERVAL,
            config_dir: None,
            cache_dir: None,
        }
    }
}

impl CheckpointConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// `CHECKPOINT_DISABLE` disables on any non-empty value,
    /// `CHECKPOINT_TIMEOUT` is in milliseconds, and `CHECKPOINT_URL`
    /// replaces the endpoint. Malformed values fall back to the defaults.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            disabled: lookup(DISABLE_VAR).is_some_and(|v| !v.is_empty()),
            ..Self::default()
        };

        if let Some(raw) = lookup(TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.timeout = Duration::from_millis(ms),
                _ => tracing::debug!("Ignoring invalid {}={:?}", TIMEOUT_VAR, raw),
            }
        }

        if let Some(url) = lookup(URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.endpoint = url.trim().to_string();
        }

        config
    }

    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Cache file used by `start` for a product, if caching is configured
    pub fn cache_file_for(&self, product: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{product}.json")))
    }
}
