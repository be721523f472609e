//! Sample and metric types.
//!
//! A [`Sample`] is one row of the telemetry log: a single device measured at a
//! single instant. Samples are immutable once parsed. [`Metric`] selects one
//! numeric column out of a sample for plotting.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Device index as reported by the sampler (`nvidia-smi` GPU index).
pub type DeviceId = u32;

/// One measurement for one device at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub device_id: DeviceId,
    /// Utilization in percent, always `>= 0`.
    pub utilization_pct: f64,
    /// Memory in use, MiB.
    pub memory_used: f64,
    /// Total device memory, MiB.
    pub memory_total: f64,
    /// Core temperature, °C.
    pub temperature: f64,
    /// Board power draw, W.
    pub power_draw: f64,
    /// Processes holding the device, `;`-separated. May be empty.
    pub process_label: String,
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// Plottable metric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Utilization,
    Memory,
    Temperature,
    Power,
}

impl Metric {
    /// All metrics in display order.
    pub const ALL: [Metric; 4] = [
        Metric::Utilization,
        Metric::Memory,
        Metric::Temperature,
        Metric::Power,
    ];

    /// Short axis label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Utilization => "GPU",
            Self::Memory => "MEM",
            Self::Temperature => "TMP",
            Self::Power => "PWR",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Utilization => "%",
            Self::Memory => "GB",
            Self::Temperature => "°C",
            Self::Power => "W",
        }
    }

    /// Extract this metric from a sample, in display units.
    ///
    /// Memory is logged in MiB and shown in GiB.
    pub fn value_from(self, s: &Sample) -> f64 {
        match self {
            Self::Utilization => s.utilization_pct,
            Self::Memory => s.memory_used / 1024.0,
            Self::Temperature => s.temperature,
            Self::Power => s.power_draw,
        }
    }

    /// Decimal places used when printing values of this metric.
    pub fn precision(self) -> usize {
        match self {
            Self::Memory => 1,
            _ => 0,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Utilization => "utilization",
            Self::Memory => "memory",
            Self::Temperature => "temperature",
            Self::Power => "power",
        })
    }
}
