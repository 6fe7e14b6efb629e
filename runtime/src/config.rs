//! Coordinator configuration.
//!
//! Loaded from `ADMISSION_*` environment variables with defaults for anything unset.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `ADMISSION_LOCK_TIMEOUT_MS` | 2000 | Max wait for a ticket's lock |
//! | `ADMISSION_STORE_TIMEOUT_MS` | 1000 | Max duration of a single store call |
//! | `ADMISSION_AUDIT_TIMEOUT_MS` | 500 | Max duration of a single audit append |
//! | `ADMISSION_LOCK_SHARDS` | 16 | Shards in the lock table |
//! | `ADMISSION_COMMIT_RETRIES` | 3 | Retries after a version conflict |
//! | `ADMISSION_RETRY_INITIAL_DELAY_MS` | 10 | First backoff delay |
//! | `ADMISSION_RETRY_MAX_DELAY_MS` | 200 | Backoff cap |

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("Invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// A value parses but is out of range.
    #[error("Out of range: {0}")]
    OutOfRange(String),
}

/// Runtime settings for the scan coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Max wait for a ticket's lock before failing with a timeout
    #[serde(with = "millis")]
    pub lock_timeout: Duration,
    /// Max duration of a single store call
    #[serde(with = "millis")]
    pub store_timeout: Duration,
    /// Max duration of a single audit append; expiry counts as an audit failure
    #[serde(with = "millis")]
    pub audit_timeout: Duration,
    /// Shards in the lock table
    pub lock_shards: usize,
    /// Retries after a version conflict
    pub commit_retries: usize,
    /// First backoff delay between commit retries
    #[serde(with = "millis")]
    pub retry_initial_delay: Duration,
    /// Backoff cap between commit retries
    #[serde(with = "millis")]
    pub retry_max_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            store_timeout: Duration::from_millis(1000),
            audit_timeout: Duration::from_millis(500),
            lock_shards: 16,
            commit_retries: 3,
            retry_initial_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(200),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unparsable or out-of-range
    /// value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`CoordinatorConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            lock_timeout: millis_or(&lookup, "ADMISSION_LOCK_TIMEOUT_MS", defaults.lock_timeout)?,
            store_timeout: millis_or(&lookup, "ADMISSION_STORE_TIMEOUT_MS", defaults.store_timeout)?,
            audit_timeout: millis_or(&lookup, "ADMISSION_AUDIT_TIMEOUT_MS", defaults.audit_timeout)?,
            lock_shards: parse_or(&lookup, "ADMISSION_LOCK_SHARDS", defaults.lock_shards)?,
            commit_retries: parse_or(&lookup, "ADMISSION_COMMIT_RETRIES", defaults.commit_retries)?,
            retry_initial_delay: millis_or(
                &lookup,
                "ADMISSION_RETRY_INITIAL_DELAY_MS",
                defaults.retry_initial_delay,
            )?,
            retry_max_delay: millis_or(
                &lookup,
                "ADMISSION_RETRY_MAX_DELAY_MS",
                defaults.retry_max_delay,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for zero timeouts, zero shards, or a backoff
    /// cap below the initial delay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout.is_zero() || self.store_timeout.is_zero() || self.audit_timeout.is_zero() {
            return Err(ConfigError::OutOfRange("timeouts must be non-zero".to_string()));
        }
        if self.lock_shards == 0 {
            return Err(ConfigError::OutOfRange("lock_shards must be at least 1".to_string()));
        }
        if self.retry_max_delay < self.retry_initial_delay {
            return Err(ConfigError::OutOfRange(
                "retry_max_delay must not be below retry_initial_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Backoff policy for commit conflicts.
    #[must_use]
    pub const fn commit_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.commit_retries)
            .initial_delay(self.retry_initial_delay)
            .max_delay(self.retry_max_delay)
            .build()
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, key, default_ms).map(Duration::from_millis)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
