//! Configuration types for the reward scheduler.

use crate::error::{PiggyError, Result};
use crate::money::Cents;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PiggyConfig {
    /// Amount and cadence of credits.
    pub schedule: ScheduleConfig,
    /// Flags forwarded opaquely to the representative-event controller.
    pub presentation: PresentationConfig,
    /// Polling intervals used while the host is inactive or not ready.
    pub retry: RetryConfig,
    /// Durable state location.
    pub store: StoreConfig,
}

/// Credit amount and period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Currency credited per period (rounded to cents).
    pub amount: f64,
    /// Period length in seconds. Must be positive.
    pub period_secs: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            amount: 0.5,
            period_secs: 6.0,
        }
    }
}

impl ScheduleConfig {
    /// Amount per period in cents.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] for negative or non-finite amounts.
    pub fn amount_cents(&self) -> Result<Cents> {
        Cents::from_decimal(self.amount)
    }

    /// Period as a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] unless the period is finite and at
    /// least one millisecond.
    pub fn period(&self) -> Result<Duration> {
        period_from_secs(self.period_secs)
    }
}

/// Convert a period in seconds into a validated [`Duration`].
///
/// # Errors
///
/// Returns [`PiggyError::Config`] for non-positive, non-finite, or
/// sub-millisecond periods.
pub fn period_from_secs(secs: f64) -> Result<Duration> {
    let period = Duration::try_from_secs_f64(secs)
        .map_err(|e| PiggyError::Config(format!("invalid period {secs}s: {e}")))?;
    validate_period(period)?;
    Ok(period)
}

/// Reject periods shorter than one millisecond (including zero).
///
/// # Errors
///
/// Returns [`PiggyError::Config`] when the period is too short.
pub fn validate_period(period: Duration) -> Result<()> {
    if period < Duration::from_millis(1) {
        return Err(PiggyError::Config(format!(
            "period must be at least 1ms, got {period:?}"
        )));
    }
    Ok(())
}

/// Presentation flags. The scheduler never interprets these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    /// Play a sound with each representative event.
    pub sound_on: bool,
    /// How long a representative event plays, in seconds. Defaults to the
    /// period, so the visible effect spans exactly one period.
    pub event_secs: Option<f64>,
}

impl PresentationConfig {
    /// Play length override, if configured and valid.
    ///
    /// # Errors
    ///
    /// Returns [`PiggyError::Config`] for negative or non-finite values.
    pub fn event_duration(&self) -> Result<Option<Duration>> {
        self.event_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_err(|e| PiggyError::Config(format!("invalid event length {secs}s: {e}")))
            })
            .transpose()
    }
}

/// Fixed retry delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay between checks while the host is inactive (ms).
    pub inactive_retry_ms: u64,
    /// Delay between checks while the event target is not ready (ms).
    pub readiness_retry_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            inactive_retry_ms: 5_000,
            readiness_retry_ms: 50,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn inactive_retry(&self) -> Duration {
        Duration::from_millis(self.inactive_retry_ms.max(1))
    }

    #[must_use]
    pub fn readiness_retry(&self) -> Duration {
        Duration::from_millis(self.readiness_retry_ms.max(1))
    }
}

/// Durable state settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// State file path. `None` uses `~/.config/piggy/state.json`.
    pub state_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolved state file path, if one can be determined.
    #[must_use]
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.state_path
            .clone()
            .or_else(crate::store::JsonFileStore::default_path)
    }
}

impl PiggyConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| PiggyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PiggyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every value the scheduler will convert.
    ///
    /// # Errors
    ///
    /// Returns the first [`PiggyError::Config`] found.
    pub fn validate(&self) -> Result<()> {
        self.schedule.amount_cents()?;
        self.schedule.period()?;
        self.presentation.event_duration()?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/piggy/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("piggy").join("config.toml")
        } else if let Some(dir) = dirs::config_dir() {
            dir.join("piggy").join("config.toml")
        } else {
            PathBuf::from("/tmp/piggy-config/config.toml")
        }
    }
}
