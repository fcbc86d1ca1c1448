//! Configuration system using Figment.
//!
//! This module provides strongly-typed configuration loading for the logger.
//! Configuration is loaded from:
//! 1. `config/default.toml` file (base configuration)
//! 2. Environment variables (prefixed with `OCVLOG_`)
//!
//! A missing configuration file is not an error: the tool must run with zero
//! setup, so every field carries a serde default.
//!
//! # Environment Variable Overrides
//!
//! Environment variables with the `OCVLOG_` prefix can override configuration
//! values, with `__` separating the section from the key:
//!
//! ```text
//! OCVLOG_METER__AVERAGING_COUNT=10
//! OCVLOG_LIMITS__MAX_CELLS=400
//! OCVLOG_BUS__BAUD_RATE=115200
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level logger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Meter behavior (averaging filter, settle interval)
    #[serde(default)]
    pub meter: MeterSettings,
    /// Reading validation thresholds and the valid cell-index range
    #[serde(default)]
    pub limits: LimitSettings,
    /// Instrument bus transport settings
    #[serde(default)]
    pub bus: BusSettings,
}

/// Meter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterSettings {
    /// Number of readings averaged by the DMM's internal repeating filter
    #[serde(default = "default_averaging_count")]
    pub averaging_count: u32,
    /// Post-trigger settle interval in milliseconds, long enough for the
    /// averaging filter to complete before the response is read back
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Reading validation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitSettings {
    /// Highest cell index accepted by the logger
    #[serde(default = "default_max_cells")]
    pub max_cells: u32,
    /// Readings below this are treated as "no cell connected" and discarded
    #[serde(default = "default_zero_floor")]
    pub zero_floor: f64,
    /// Lower bound of the plausible operating band; readings outside the band
    /// are recorded with a warning
    #[serde(default = "default_min_plausible")]
    pub min_plausible_volts: f64,
    /// Upper bound of the plausible operating band
    #[serde(default = "default_max_plausible")]
    pub max_plausible_volts: f64,
}

/// Bus transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    /// Baud rate for serial transports (e.g., 9600, 115200)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Overall deadline in milliseconds for a single bus read or identity probe
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Terminator appended to outgoing commands
    #[serde(default = "default_line_terminator")]
    pub line_terminator: String,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            averaging_count: default_averaging_count(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_cells: default_max_cells(),
            zero_floor: default_zero_floor(),
            min_plausible_volts: default_min_plausible(),
            max_plausible_volts: default_max_plausible(),
        }
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            line_terminator: default_line_terminator(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_averaging_count() -> u32 {
    5
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_max_cells() -> u32 {
    700
}

fn default_zero_floor() -> f64 {
    0.05
}

fn default_min_plausible() -> f64 {
    2.7
}

fn default_max_plausible() -> f64 {
    4.2
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_line_terminator() -> String {
    "\n".to_string()
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl Settings {
    /// Load configuration from `config/default.toml` and environment variables.
    ///
    /// Configuration is loaded in this order of precedence (highest to lowest):
    /// 1. Environment variables (`OCVLOG_` prefix)
    /// 2. `config/default.toml` file
    ///
    /// After loading, configuration is validated.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be parsed or validation
    /// fails. A missing file yields the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/default.toml")
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be parsed or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("OCVLOG_").split("__"))
            .extract()
            .map_err(ConfigError::LoadError)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] with a descriptive message for any validation
    /// failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.meter.averaging_count == 0 || self.meter.averaging_count > 100 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid averaging_count {}. Must be 1-100",
                self.meter.averaging_count
            )));
        }

        if self.limits.max_cells == 0 {
            return Err(ConfigError::ValidationError(
                "Invalid max_cells 0. Must be > 0".to_string(),
            ));
        }

        if self.limits.min_plausible_volts >= self.limits.max_plausible_volts {
            return Err(ConfigError::ValidationError(format!(
                "Invalid plausible band [{}, {}]. min_plausible_volts must be < max_plausible_volts",
                self.limits.min_plausible_volts, self.limits.max_plausible_volts
            )));
        }

        if self.limits.zero_floor >= self.limits.min_plausible_volts {
            return Err(ConfigError::ValidationError(format!(
                "Invalid zero_floor {}. Must be < min_plausible_volts ({})",
                self.limits.zero_floor, self.limits.min_plausible_volts
            )));
        }

        if self.bus.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Invalid timeout_ms 0. Must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
