//! Tuning knobs for the resilient harvester.
//!
//! Defaults reproduce the constants the sync has always used against the
//! remote search API; every value can be overridden through [`crate::AppConfig`].

use std::time::Duration;

use crate::ConfigError;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.ncrangola.com/_v/segment/graphql/v1";
pub const DEFAULT_PERSISTED_QUERY_HASH: &str =
    "e48b7999b5713c9ed7d378bea1bd1cf64c81080be71d91e0f0b427f41e858451";
pub const DEFAULT_QUERY_SENDER: &str = "vtex.store-resources@0.x";
pub const DEFAULT_QUERY_PROVIDER: &str = "vtex.search-graphql@0.x";
pub const DEFAULT_USER_AGENT: &str = "catsync/0.1 (catalog-sync)";

/// Remote endpoint and the static persisted-query identity sent with every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub endpoint: String,
    pub user_agent: String,
    pub persisted_query_hash: String,
    pub sender: String,
    pub provider: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            persisted_query_hash: DEFAULT_PERSISTED_QUERY_HASH.to_string(),
            sender: DEFAULT_QUERY_SENDER.to_string(),
            provider: DEFAULT_QUERY_PROVIDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Cooldown measured from the last recorded failure.
    pub recovery_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Retry ladder and backoff parameters for a single page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total ladder attempts before the fallback request.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Per-attempt read timeouts; the last rung repeats once exhausted.
    pub timeout_ladder: Vec<Duration>,
    /// Upper bound on the connect timeout derived from a ladder rung.
    pub max_connect_timeout: Duration,
    pub fallback_connect_timeout: Duration,
    pub fallback_read_timeout: Duration,
    pub rate_limit_jitter: Duration,
    pub timeout_jitter: Duration,
    pub connection_jitter: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 8,
            base_delay: Duration::from_millis(200),
            timeout_ladder: [3, 4, 5, 6, 8, 10, 12, 15]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            max_connect_timeout: Duration::from_secs(2),
            fallback_connect_timeout: Duration::from_secs(1),
            fallback_read_timeout: Duration::from_secs(3),
            rate_limit_jitter: Duration::from_secs(1),
            timeout_jitter: Duration::from_millis(200),
            connection_jitter: Duration::from_millis(300),
        }
    }
}

/// Bounds and thresholds for the additive batch-size controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub min: u32,
    pub max: u32,
    pub initial: u32,
    /// Successful pages faster than this grow the batch by one.
    pub fast_below: Duration,
    /// Successful pages slower than this shrink the batch by one.
    pub slow_above: Duration,
    pub failure_step: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            min: 3,
            max: 12,
            initial: 5,
            fast_below: Duration::from_secs(5),
            slow_above: Duration::from_secs(15),
            failure_step: 2,
        }
    }
}

/// Per-category loop limits and inter-page pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationSettings {
    /// Consecutive exhausted pages that abort a category.
    pub failure_ceiling: u32,
    /// Hard cap on requests per category; guards against cycling cursors.
    pub max_pages: u32,
    /// Pause after an exhausted page before moving on.
    pub failure_pause: Duration,
    pub min_pace: Duration,
    pub max_pace: Duration,
    /// Added to the pace for every failure currently counted by the breaker.
    pub pace_per_breaker_failure: Duration,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            failure_ceiling: 8,
            max_pages: 2_000,
            failure_pause: Duration::from_secs(1),
            min_pace: Duration::from_millis(100),
            max_pace: Duration::from_millis(500),
            pace_per_breaker_failure: Duration::from_millis(40),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSettings {
    pub remote: RemoteSettings,
    pub breaker: BreakerSettings,
    pub retry: RetrySettings,
    pub batch: BatchSettings,
    pub pagination: PaginationSettings,
}

impl HarvestSettings {
    /// Zeroes every sleep (backoff, jitter, pauses, pacing) while keeping the
    /// attempt counts and thresholds intact.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.retry.base_delay = Duration::ZERO;
        self.retry.rate_limit_jitter = Duration::ZERO;
        self.retry.timeout_jitter = Duration::ZERO;
        self.retry.connection_jitter = Duration::ZERO;
        self.pagination.failure_pause = Duration::ZERO;
        self.pagination.min_pace = Duration::ZERO;
        self.pagination.max_pace = Duration::ZERO;
        self.pagination.pace_per_breaker_failure = Duration::ZERO;
        self
    }

    /// Checks cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let batch = &self.batch;
        if batch.min == 0 {
            return Err(ConfigError::Validation(
                "batch minimum must be at least 1".to_string(),
            ));
        }
        if !(batch.min <= batch.initial && batch.initial <= batch.max) {
            return Err(ConfigError::Validation(format!(
                "batch sizes must satisfy min <= initial <= max (got {} / {} / {})",
                batch.min, batch.initial, batch.max
            )));
        }
        if self.retry.max_retries == 0 {
            return Err(ConfigError::Validation(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.retry.timeout_ladder.is_empty() {
            return Err(ConfigError::Validation(
                "timeout ladder must contain at least one rung".to_string(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::Validation(
                "breaker failure threshold must be at least 1".to_string(),
            ));
        }
        if self.pagination.failure_ceiling == 0 {
            return Err(ConfigError::Validation(
                "category failure ceiling must be at least 1".to_string(),
            ));
        }
        if self.remote.persisted_query_hash.trim().is_empty() {
            return Err(ConfigError::Validation(
                "persisted query hash must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}
