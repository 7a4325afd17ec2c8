use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::model::{Coordinate, FilterMode};
use crate::{AppError, ErrorKind, FETCH_TIMEOUT, LOCATION_TIMEOUT, MAX_TIMEOUT, MIN_TIMEOUT};

/// When a mode change should ask the device for a fresh position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationPolicy {
    /// Re-acquire on every mode change, whether or not the new mode needs it.
    #[default]
    EveryModeChange,
    /// Only when switching to NearMe with no resolved coordinate.
    NearMeOnly,
}

impl LocationPolicy {
    #[must_use]
    pub const fn wants_location(self, mode: FilterMode, coordinate: Coordinate) -> bool {
        match self {
            Self::EveryModeChange => true,
            Self::NearMeOnly => {
                mode.uses_location() && matches!(coordinate, Coordinate::Unset)
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be between {min_ms}ms and {max_ms}ms, got {value_ms}ms")]
    TimeoutOutOfRange {
        field: &'static str,
        value_ms: u64,
        min_ms: u64,
        max_ms: u64,
    },

    #[error("invalid configuration: {0}")]
    Parse(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub location_policy: LocationPolicy,
    pub location_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            location_policy: LocationPolicy::default(),
            location_timeout_ms: duration_ms(LOCATION_TIMEOUT),
            fetch_timeout_ms: duration_ms(FETCH_TIMEOUT),
        }
    }
}

impl ControllerConfig {
    /// Parses and validates a JSON config handed over by the shell. Missing
    /// fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_timeout("location_timeout_ms", self.location_timeout_ms)?;
        check_timeout("fetch_timeout_ms", self.fetch_timeout_ms)?;
        Ok(())
    }

    #[must_use]
    pub const fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }

    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn check_timeout(field: &'static str, value_ms: u64) -> Result<(), ConfigError> {
    let min_ms = duration_ms(MIN_TIMEOUT);
    let max_ms = duration_ms(MAX_TIMEOUT);
    if (min_ms..=max_ms).contains(&value_ms) {
        Ok(())
    } else {
        Err(ConfigError::TimeoutOutOfRange {
            field,
            value_ms,
            min_ms,
            max_ms,
        })
    }
}
