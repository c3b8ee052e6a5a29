//! Prediction configuration

use crate::error::ConfigError;
use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Default lookback horizon in hours
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Default distance at which two hours of day count as similar
pub const DEFAULT_SIMILARITY_TOLERANCE_HOURS: u32 = 1;

/// Default minimum probability that triggers pre-warming
pub const DEFAULT_THRESHOLD: f64 = 0.6;

const MAX_TOLERANCE_HOURS: u32 = 23;
const MAX_UTC_OFFSET_SECS: u32 = 86_399;

/// How the distance between two hours of day is measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HourDistance {
    /// Wraps at midnight: 23 and 0 are one hour apart
    #[default]
    Circular,
    /// Plain absolute difference: 23 and 0 are 23 hours apart
    Linear,
}

impl HourDistance {
    pub fn between(&self, a: u32, b: u32) -> u32 {
        let d = a.abs_diff(b);
        match self {
            HourDistance::Circular => d.min(24u32.saturating_sub(d)),
            HourDistance::Linear => d,
        }
    }
}

/// Immutable configuration for demand prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Lookback horizon
    pub window_hours: i64,
    /// Max hour-of-day distance counted as similar
    pub similarity_tolerance_hours: u32,
    /// Minimum probability to trigger pre-warming
    pub threshold: f64,
    pub hour_distance: HourDistance,
    /// Fixed time zone used to bucket timestamps by hour of day
    pub utc_offset_secs: i32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_WINDOW_HOURS,
            similarity_tolerance_hours: DEFAULT_SIMILARITY_TOLERANCE_HOURS,
            threshold: DEFAULT_THRESHOLD,
            hour_distance: HourDistance::default(),
            utc_offset_secs: 0,
        }
    }
}

impl PredictionConfig {
    /// Build a validated configuration
    pub fn new(
        window_hours: i64,
        similarity_tolerance_hours: u32,
        threshold: f64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            window_hours,
            similarity_tolerance_hours,
            threshold,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_hour_distance(mut self, hour_distance: HourDistance) -> Self {
        self.hour_distance = hour_distance;
        self
    }

    pub fn with_utc_offset_secs(mut self, utc_offset_secs: i32) -> Self {
        self.utc_offset_secs = utc_offset_secs;
        self
    }

    /// Reject values the predictor cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_hours <= 0 {
            return Err(ConfigError::NonPositiveWindow(self.window_hours));
        }
        if self.similarity_tolerance_hours > MAX_TOLERANCE_HOURS {
            return Err(ConfigError::InvalidTolerance(self.similarity_tolerance_hours));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold));
        }
        if self.utc_offset_secs.unsigned_abs() > MAX_UTC_OFFSET_SECS {
            return Err(ConfigError::InvalidUtcOffset(self.utc_offset_secs));
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}
