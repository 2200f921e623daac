//! Sampling interval configuration
//!
//! The interval is the only persisted setting. It is loaded once at startup,
//! self-repairs a corrupt or missing store by writing the default back, and is
//! quantized to 0.01s.

pub mod store;

pub use store::{ConfigStore, FileConfigStore, StoreError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Interval used when the store is missing or malformed
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Granularity every interval is snapped to, in hundredths of a second
const STEPS_PER_SECOND: f64 = 100.0;

/// Config-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid interval: {0:?}")]
    InvalidInterval(String),
}

/// A validated capture interval: finite, positive, multiple of 0.01s
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CaptureInterval(f64);

impl CaptureInterval {
    /// Snap `secs` to the nearest 0.01s and reject anything that is not positive afterwards.
    pub fn from_secs(secs: f64) -> Option<Self> {
        if !secs.is_finite() {
            return None;
        }
        let snapped = (secs * STEPS_PER_SECOND).round() / STEPS_PER_SECOND;
        (snapped > 0.0).then_some(Self(snapped))
    }

    /// Parse user-entered text such as `"2.5"`.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().and_then(Self::from_secs)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs_f64(self.0)
    }
}

impl Default for CaptureInterval {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL_SECS)
    }
}

impl fmt::Display for CaptureInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}s", self.0)
    }
}

/// On-disk layout of the config record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub interval: f64,
}

/// The effective interval plus the store it is persisted to
pub struct IntervalConfig {
    store: Box<dyn ConfigStore>,
    current: CaptureInterval,
}

impl IntervalConfig {
    /// Load the interval from `store`.
    ///
    /// Never fails: unreadable, unparsable or non-positive records fall back to
    /// [`DEFAULT_INTERVAL_SECS`]. The effective value is written back on every
    /// load so a damaged file is repaired.
    pub fn load(store: Box<dyn ConfigStore>) -> Self {
        let current = match Self::read(store.as_ref()) {
            Ok(interval) => interval,
            Err(e) => {
                tracing::warn!("Config unreadable ({}), using default interval", e);
                CaptureInterval::default()
            }
        };

        let config = Self { store, current };
        if let Err(e) = config.persist() {
            tracing::warn!("Failed to rewrite config: {}", e);
        }

        tracing::info!("Capture interval: {}", config.current);
        config
    }

    fn read(store: &dyn ConfigStore) -> Result<CaptureInterval, ConfigError> {
        let bytes = store.load()?;
        let persisted: PersistedConfig = serde_json::from_slice(&bytes)?;
        CaptureInterval::from_secs(persisted.interval)
            .ok_or_else(|| ConfigError::InvalidInterval(persisted.interval.to_string()))
    }

    fn persist(&self) -> Result<(), ConfigError> {
        let record = PersistedConfig {
            interval: self.current.as_secs(),
        };
        let bytes = serde_json::to_vec_pretty(&record)?;
        self.store.save(&bytes)?;
        Ok(())
    }

    pub fn current(&self) -> CaptureInterval {
        self.current
    }

    /// Validate user-entered text without touching the current value.
    pub fn validate(raw: &str) -> Option<CaptureInterval> {
        CaptureInterval::parse(raw)
    }

    /// Replace the interval with `raw` if it validates.
    ///
    /// Invalid input leaves the previous value in place. An accepted value is
    /// persisted; a failed save is logged and the new value still applies.
    pub fn set(&mut self, raw: &str) -> Result<CaptureInterval, ConfigError> {
        let interval =
            Self::validate(raw).ok_or_else(|| ConfigError::InvalidInterval(raw.to_string()))?;
        self.current = interval;

        if let Err(e) = self.persist() {
            tracing::warn!("Failed to persist interval {}: {}", interval, e);
        }
        Ok(interval)
    }
}
