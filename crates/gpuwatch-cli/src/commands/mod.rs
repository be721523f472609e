pub mod list;
pub mod view;

use std::path::Path;

use gpuwatch_core::{DashboardConfig, Metric};

/// Load the dashboard config, or defaults when no path is given.
/// Exits with an error message if the file is unreadable or invalid.
pub fn load_config(path: Option<&Path>) -> DashboardConfig {
    let Some(path) = path else {
        return DashboardConfig::default();
    };
    match DashboardConfig::load(path) {
        Ok(config) => {
            log::info!("using config {}", path.display());
            config
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Which `--show-*` flags were given.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricFlags {
    pub util: bool,
    pub temp: bool,
    pub power: bool,
    pub all: bool,
}

/// Combine configured metrics with `--show-*` flags. Flags only add plots;
/// the result is in display order without duplicates.
pub fn resolve_metrics(configured: &[Metric], flags: MetricFlags) -> Vec<Metric> {
    if flags.all {
        return Metric::ALL.to_vec();
    }
    Metric::ALL
        .into_iter()
        .filter(|m| {
            configured.contains(m)
                || match m {
                    Metric::Utilization => flags.util,
                    Metric::Temperature => flags.temp,
                    Metric::Power => flags.power,
                    Metric::Memory => false,
                }
        })
        .collect()
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}
