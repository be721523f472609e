//! Dashboard configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! overrides:
//!
//! ```json
//! {
//!   "metrics": ["utilization", "power"],
//!   "scales": { "memory": { "floor": 0, "ceiling": 24 } }
//! }
//! ```
//!
//! The color scales are the reference ranges the rasterizer grades raw
//! values against. Device capacity is not discovered from the log, so a
//! 24 GB card wants a smaller memory ceiling than the 80 GB default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::raster::{ColorScale, RenderMode};
use crate::sample::Metric;
use crate::view::{DEFAULT_DURATION, MIN_DURATION};

/// Longest configurable default window: one year.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-metric reference ranges for color grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScales {
    pub utilization: ColorScale,
    /// GB.
    pub memory: ColorScale,
    /// °C.
    pub temperature: ColorScale,
    /// W.
    pub power: ColorScale,
}

impl Default for ColorScales {
    fn default() -> Self {
        Self {
            utilization: ColorScale::new(0.0, 100.0),
            memory: ColorScale::new(0.0, 80.0),
            temperature: ColorScale::new(30.0, 90.0),
            power: ColorScale::new(0.0, 400.0),
        }
    }
}

impl ColorScales {
    pub fn for_metric(&self, metric: Metric) -> &ColorScale {
        match metric {
            Metric::Utilization => &self.utilization,
            Metric::Memory => &self.memory,
            Metric::Temperature => &self.temperature,
            Metric::Power => &self.power,
        }
    }
}

/// Everything the dashboard can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Window duration on startup and after reset, seconds.
    pub window_secs: u64,
    /// Live refresh interval, milliseconds.
    pub tick_ms: u64,
    pub render_mode: RenderMode,
    /// Grade plot columns by magnitude.
    pub color_columns: bool,
    /// Metrics plotted per device, in order.
    pub metrics: Vec<Metric>,
    pub scales: ColorScales,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            tick_ms: 1000,
            render_mode: RenderMode::Filled,
            color_columns: true,
            metrics: vec![Metric::Memory],
            scales: ColorScales::default(),
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let min_secs = MIN_DURATION.num_seconds() as u64;
        if !(min_secs..=MAX_WINDOW_SECS).contains(&self.window_secs) {
            return Err(ConfigError::Invalid(format!(
                "window_secs must be between {min_secs} and {MAX_WINDOW_SECS}"
            )));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be positive".into()));
        }
        for metric in Metric::ALL {
            let s = self.scales.for_metric(metric);
            if !(s.ceiling > s.floor) {
                return Err(ConfigError::Invalid(format!(
                    "{metric} scale ceiling must exceed its floor"
                )));
            }
        }
        Ok(())
    }

    /// Default window duration, capped at [`MAX_WINDOW_SECS`].
    pub fn window(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.window_secs.min(MAX_WINDOW_SECS) as i64)
            .unwrap_or(DEFAULT_DURATION)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
