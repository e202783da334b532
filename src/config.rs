//! # Runtime configuration.
//!
//! [`Config`] groups the settings of the event bus and the recovery watchdog.
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [bus]
//! history_enabled = true
//! history_cap = 100
//!
//! [watchdog]
//! enabled = false
//! interval = "30s"
//! max_attempts = 3
//! backoff = { first = "1s", max = "60s", factor = 2.0, jitter = "equal" }
//! ```
//!
//! Durations use humantime notation (`"250ms"`, `"1m 30s"`).

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policies::BackoffPolicy;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event bus settings.
    pub bus: BusConfig,
    /// Recovery watchdog settings.
    pub watchdog: WatchdogConfig,
}

/// Event bus settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Keep recent events per type for [`EventBus::history`](crate::EventBus::history).
    pub history_enabled: bool,
    /// Events retained per type.
    pub history_cap: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_enabled: true,
            history_cap: 100,
        }
    }
}

/// Recovery watchdog for critical units.
///
/// Disabled by default: a failed unit stays failed until restarted explicitly.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Run the watchdog.
    pub enabled: bool,
    /// Time between scans.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Delay between restart attempts of the same unit.
    pub backoff: BackoffPolicy,
    /// Restart attempts per unit before giving up (reset once it runs again).
    pub max_attempts: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            max_attempts: 3,
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.history_cap == 0 {
            return Err(invalid("bus.history_cap", "must be greater than zero"));
        }
        if self.watchdog.interval.is_zero() {
            return Err(invalid("watchdog.interval", "must be greater than zero"));
        }
        if !self.watchdog.backoff.is_valid() {
            return Err(invalid(
                "watchdog.backoff",
                "factor must be finite and >= 1.0, max must be non-zero",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
