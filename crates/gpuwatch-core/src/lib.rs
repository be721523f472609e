//! # gpuwatch-core
//!
//! **Live time-series engine behind the gpuwatch dashboard.**
//!
//! `gpuwatch-core` ingests an append-only GPU telemetry log, indexes it per
//! device for binary-searched range queries, keeps a navigable view window
//! in sync with new rows, and rasterizes series into braille glyph grids.
//! It knows nothing about terminals: the CLI paints the [`Frame`]s it
//! produces.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gpuwatch_core::{Dashboard, DashboardConfig, FileSource, FrameSpec, Ingestor, loader};
//!
//! let now = chrono::Local::now().naive_local();
//! let mut dash = Dashboard::new(DashboardConfig::default(), true, now);
//! let loaded = loader::load(Ingestor::new(FileSource::new("logs/gpu_20240101_000000.csv")), false);
//! dash.on_loaded(loaded, now);
//!
//! let frame = dash.frame(FrameSpec::default());
//! println!("{}", frame.status);
//! ```
//!
//! ## Architecture
//!
//! log file → Ingestor (incremental parse) → SeriesIndex → ViewWindow selects
//! a range → Dashboard → rasterizer → Frame
//!
//! Every navigation step is a pure function of the window and the index
//! bounds; only the live tick and the initial load touch the file.

pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod parser;
pub mod raster;
pub mod sample;
pub mod scheduler;
pub mod view;

pub use catalog::{DEFAULT_LOGS_DIR, LogEntry, find_logs, latest_log};
pub use config::{ColorScales, ConfigError, DashboardConfig};
pub use dashboard::{
    Action, Activity, Axis, Body, Dashboard, DeviceCard, Frame, FrameSpec, GaugeReading,
    LiveState, Plot, StatusLine,
};
pub use index::{AppendError, Bounds, SeriesIndex};
pub use ingest::{
    FileSource, IngestError, IngestStats, Ingestor, LogSource, MemorySource, Update,
};
pub use loader::{LoadPoll, Loaded, Loader};
pub use parser::{LogSchema, ParseError, ParsedChunk, parse_chunk, parse_record};
pub use raster::{ColorScale, Gauge, Grid, Raster, RenderMode, Tier, gauge, rasterize, sparkline};
pub use sample::{DeviceId, Metric, Sample};
pub use scheduler::{RedrawGate, Ticker};
pub use view::{PanDirection, ViewWindow};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
