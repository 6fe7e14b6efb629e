//! Configuration management for the gate console.
//!
//! Loads configuration from environment variables with sensible defaults.

use admission_runtime::config::{ConfigError, CoordinatorConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Gate configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// JSON policy file (`ADMISSION_POLICY_FILE`); built-in policies if unset
    pub policy_file: Option<PathBuf>,
    /// JSON ticket seed file (`ADMISSION_TICKETS_FILE`); empty store if unset
    pub tickets_file: Option<PathBuf>,
    /// Buffered notifications before slow consumers lag
    /// (`ADMISSION_NOTIFY_CAPACITY`, default: 1024)
    pub notify_capacity: usize,
    /// Coordinator settings (`ADMISSION_*`, see [`CoordinatorConfig`])
    pub coordinator: CoordinatorConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            policy_file: None,
            tickets_file: None,
            notify_capacity: 1024,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`GateConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };

        let notify_capacity = match lookup("ADMISSION_NOTIFY_CAPACITY") {
            None => Self::default().notify_capacity,
            Some(value) => match value.trim().parse() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::Invalid {
                        key: "ADMISSION_NOTIFY_CAPACITY",
                        value,
                    });
                }
                Ok(capacity) => capacity,
            },
        };

        Ok(Self {
            policy_file: path("ADMISSION_POLICY_FILE"),
            tickets_file: path("ADMISSION_TICKETS_FILE"),
            notify_capacity,
            coordinator: CoordinatorConfig::from_lookup(&lookup)?,
        })
    }
}
