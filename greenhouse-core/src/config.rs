//! Repository configuration.
//!
//! Loaded from environment variables with defaults suited to a small
//! catalogue. All knobs are optional: an unconfigured repository waits
//! indefinitely for the sort order, falls back to an empty order, and
//! refreshes on every request.

use std::time::Duration;

use crate::error::ConfigError;
use crate::OrderList;

/// Configuration for a plant repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    /// How long a single caller waits for the sort order before using the
    /// fallback for that call. `None` waits for the fetch to finish.
    pub sort_wait_timeout: Option<Duration>,
    /// Order used when the remote sort order can't be fetched.
    pub fallback_sort_order: OrderList,
    /// Lists with at least this many plants are sorted on the blocking pool.
    pub sort_offload_threshold: usize,
    /// When set, a target is refreshed at most once per interval.
    pub refresh_min_interval: Option<Duration>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            sort_wait_timeout: None,
            fallback_sort_order: OrderList::empty(),
            sort_offload_threshold: 256,
            refresh_min_interval: None,
        }
    }
}

impl RepositoryConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create RepositoryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `GREENHOUSE_SORT_WAIT_TIMEOUT_MS`: per-caller wait limit (unset or 0 = wait for the fetch)
    /// - `GREENHOUSE_FALLBACK_SORT_ORDER`: comma-separated plant ids (default: empty)
    /// - `GREENHOUSE_SORT_OFFLOAD_THRESHOLD`: list size for blocking-pool sorts (default: 256)
    /// - `GREENHOUSE_REFRESH_MIN_INTERVAL_SECS`: minimum seconds between refreshes of a target
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let sort_wait_timeout = match env_parse::<u64>("GREENHOUSE_SORT_WAIT_TIMEOUT_MS")? {
            Some(0) | None => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        };

        let fallback_sort_order = std::env::var("GREENHOUSE_FALLBACK_SORT_ORDER")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.fallback_sort_order);

        let sort_offload_threshold = env_parse::<usize>("GREENHOUSE_SORT_OFFLOAD_THRESHOLD")?
            .unwrap_or(defaults.sort_offload_threshold);

        let refresh_min_interval = env_parse::<u64>("GREENHOUSE_REFRESH_MIN_INTERVAL_SECS")?
            .map(Duration::from_secs);

        let config = Self {
            sort_wait_timeout,
            fallback_sort_order,
            sort_offload_threshold,
            refresh_min_interval,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the per-caller wait limit for the sort order.
    pub fn with_sort_wait_timeout(mut self, timeout: Duration) -> Self {
        self.sort_wait_timeout = Some(timeout);
        self
    }

    /// Set the fallback sort order.
    pub fn with_fallback_sort_order(mut self, order: impl Into<OrderList>) -> Self {
        self.fallback_sort_order = order.into();
        self
    }

    /// Set the blocking-pool sort threshold.
    pub fn with_sort_offload_threshold(mut self, threshold: usize) -> Self {
        self.sort_offload_threshold = threshold;
        self
    }

    /// Only refresh a target once per `interval`.
    pub fn with_refresh_min_interval(mut self, interval: Duration) -> Self {
        self.refresh_min_interval = Some(interval);
        self
    }

    /// Check the config for values that would make the repository misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.sort_wait_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "sort_wait_timeout".to_string(),
                    value: "0".to_string(),
                    reason: "must be positive; leave unset to wait for the fetch".to_string(),
                });
            }
        }
        if self.sort_offload_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sort_offload_threshold".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw.clone(),
                reason: "not a valid number".to_string(),
            }),
        Err(_) => Ok(None),
    }
}
