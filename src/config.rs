//! Configuration management for Gatekeeper.
//!
//! The limiter itself never reads configuration. Callers load a
//! [`GatekeeperConfig`] and pass the values into each check and sweep.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{GatekeeperError, Result};

/// Main configuration for Gatekeeper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Admission limits
    #[serde(default)]
    pub limits: LimitConfig,

    /// Idle eviction schedule
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Limits applied to each client key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Maximum requests admitted per window (0 denies everything)
    #[serde(default = "default_max_rate")]
    pub max_rate: u64,

    /// Window width in milliseconds (0 never rolls over)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_rate: default_max_rate(),
            window_ms: default_window_ms(),
        }
    }
}

impl LimitConfig {
    /// Window width as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

fn default_max_rate() -> u64 {
    1500
}

fn default_window_ms() -> u64 {
    5000
}

/// How often idle slots are swept and when a slot counts as idle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Sweep interval in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub interval_ms: u64,

    /// Idle time in milliseconds after which a slot is evicted
    #[serde(default = "default_max_idle_ms")]
    pub max_idle_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sweep_interval_ms(),
            max_idle_ms: default_max_idle_ms(),
        }
    }
}

impl SweeperConfig {
    /// Sweep interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Idle threshold as a duration.
    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }
}

fn default_sweep_interval_ms() -> u64 {
    10_000
}

fn default_max_idle_ms() -> u64 {
    2 * default_window_ms()
}

/// Log output format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GatekeeperConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatekeeperConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    ///
    /// A zero rate or window is a legal degraded policy and only warns.
    pub fn validate(&self) -> Result<()> {
        if self.sweeper.interval_ms == 0 {
            return Err(GatekeeperError::Config(
                "sweeper.interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.limits.max_rate == 0 {
            warn!("limits.max_rate is 0, every request will be denied");
        }
        if self.limits.window_ms == 0 {
            warn!("limits.window_ms is 0, windows will never roll over");
        }
        if self.sweeper.max_idle_ms < self.limits.window_ms {
            warn!(
                max_idle_ms = self.sweeper.max_idle_ms,
                window_ms = self.limits.window_ms,
                "sweeper.max_idle_ms is shorter than the window, slots may be evicted mid-window"
            );
        }

        Ok(())
    }
}
