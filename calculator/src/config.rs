//! Calculator configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use trcalc_common::time::{constants, DurationExt};
use trcalc_common::{Result, TrcalcError};
use trcalc_fx::RateCacheConfig;

/// Where rates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateSource {
    /// Open Exchange Rates with the given app id.
    OpenExchangeRates { app_id: String },
    /// A proxy answering `{ "rates": {...}, "timestamp": ms }`.
    Endpoint { url: String },
    /// Built-in table only.
    Fallback,
}

/// Main calculator configuration.
#[derive(Debug, Clone)]
pub struct CalculatorConfig {
    /// Directory for persisted state. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Rate source.
    pub rate_source: RateSource,
    /// Upstream request timeout.
    pub request_timeout: Duration,
    /// Rate cache configuration.
    pub rate_cache: RateCacheConfig,
    /// Log level.
    pub log_level: String,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rate_source: RateSource::Fallback,
            request_timeout: constants::rate_request_timeout().as_std(),
            rate_cache: RateCacheConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Platform data directory, e.g. `~/.local/share/trcalc`.
pub fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "trcalc").map(|dirs| dirs.data_dir().to_path_buf())
}

impl CalculatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("TRCALC_DATA_DIR") {
            config.data_dir = if dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }

        // An explicit endpoint takes precedence over the upstream app id.
        if let Ok(url) = std::env::var("TRCALC_RATE_ENDPOINT") {
            config.rate_source = RateSource::Endpoint { url };
        } else if let Ok(app_id) = std::env::var("OPEN_EXCHANGE_RATES_APP_ID") {
            if !app_id.is_empty() {
                config.rate_source = RateSource::OpenExchangeRates { app_id };
            }
        }

        if let Ok(secs) = std::env::var("TRCALC_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.request_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(TrcalcError::Configuration(
                "Request timeout cannot be 0".to_string(),
            ));
        }

        if self.rate_cache.staleness_window <= chrono::Duration::zero() {
            return Err(TrcalcError::Configuration(
                "Staleness window must be positive".to_string(),
            ));
        }

        match &self.rate_source {
            RateSource::Endpoint { url } if !url.starts_with("http") => {
                return Err(TrcalcError::Configuration(format!(
                    "Rate endpoint must be an http(s) URL, got {url:?}"
                )));
            }
            RateSource::OpenExchangeRates { app_id } if app_id.trim().is_empty() => {
                return Err(TrcalcError::Configuration(
                    "Open Exchange Rates app id cannot be empty".to_string(),
                ));
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CalculatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_source, RateSource::Fallback);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = CalculatorConfig::default();
        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = CalculatorConfig::default();
        config.rate_source = RateSource::Endpoint {
            url: "ftp://rates".to_string(),
        };
        assert!(config.validate().is_err());

        let mut config = CalculatorConfig::default();
        config.rate_cache.staleness_window = chrono::Duration::zero();
        assert!(config.validate().is_err());
    }
}
