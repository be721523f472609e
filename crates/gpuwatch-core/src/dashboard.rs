//! Render orchestration.
//!
//! [`Dashboard`] owns the index, the view window and the live ingestor, and
//! turns them into a [`Frame`]: a terminal-agnostic description of what is
//! on screen. The CLI maps key presses to [`Action`]s, calls
//! [`on_tick`](Dashboard::on_tick) when its ticker fires and paints frames;
//! everything in between happens here on the UI thread.

use std::fmt;

use chrono::NaiveDateTime;

use crate::config::DashboardConfig;
use crate::index::SeriesIndex;
use crate::ingest::{IngestStats, Ingestor, LogSource, Update};
use crate::loader::Loaded;
use crate::raster::{Gauge, Raster, RenderMode, gauge, rasterize, sparkline};
use crate::sample::{DeviceId, Metric, Sample};
use crate::scheduler::RedrawGate;
use crate::view::{PanDirection, ViewWindow, ZOOM_IN, ZOOM_OUT};

/// Gauge full-scale temperature, °C.
const TEMPERATURE_GAUGE_MAX: f64 = 100.0;

/// Every user-triggered state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PanLeft,
    PanRight,
    ZoomIn,
    ZoomOut,
    JumpStart,
    JumpEnd,
    Reset,
    TogglePause,
    ToggleMode,
    Quit,
}

/// Update mode shown in the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    Paused,
    /// Live and following the newest sample.
    Live,
    /// Live, but the user has navigated into the past.
    History,
    /// Not watching the file for changes.
    Static,
}

impl LiveState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Paused => "PAUSED",
            Self::Live => "LIVE",
            Self::History => "HISTORY",
            Self::Static => "STATIC",
        }
    }
}

impl fmt::Display for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Device load classification from utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Active,
    High,
}

impl Activity {
    pub fn from_utilization(pct: f64) -> Self {
        if pct > 80.0 {
            Self::High
        } else if pct > 30.0 {
            Self::Active
        } else {
            Self::Idle
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::High => "HIGH",
        }
    }
}

// ---------------------------------------------------------------------------
// Frame description
// ---------------------------------------------------------------------------

/// Cell budget for one device card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub plot_width: usize,
    pub plot_height: usize,
    pub gauge_width: usize,
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self {
            plot_width: 46,
            plot_height: 8,
            gauge_width: 8,
        }
    }
}

/// Y axis labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub min: f64,
    pub mid: f64,
    pub max: f64,
}

impl Axis {
    fn of(values: &[f64]) -> Option<Self> {
        let min = values.iter().copied().reduce(f64::min)?;
        let max = values.iter().copied().reduce(f64::max)?;
        Some(Self {
            min,
            mid: (min + max) / 2.0,
            max,
        })
    }
}

/// One metric's plot over the visible window.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub metric: Metric,
    pub raster: Raster,
    pub axis: Option<Axis>,
    pub current: Option<f64>,
    pub average: Option<f64>,
    /// Oldest and newest visible timestamps.
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeReading {
    pub metric: Metric,
    pub value: f64,
    pub max: f64,
    /// `None` when the full-scale value is unknown.
    pub gauge: Option<Gauge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCard {
    pub device: DeviceId,
    /// `None` until the device has a sample.
    pub activity: Option<Activity>,
    /// Newest visible sample, or the newest overall when the window is empty.
    pub latest: Option<Sample>,
    /// Most recent non-empty process label in the window.
    pub process_label: Option<String>,
    /// Utilization over the window as a block sparkline.
    pub trend: String,
    pub gauges: Vec<GaugeReading>,
    pub plots: Vec<Plot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_secs: i64,
    /// Samples inside the window, all devices.
    pub sample_count: usize,
    pub state: LiveState,
    pub mode: RenderMode,
    /// Records skipped by the parser plus samples the index refused.
    pub dropped: usize,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {}  {}s │ {} │ {} samples",
            self.start.format("%H:%M:%S"),
            self.end.format("%H:%M:%S"),
            self.duration_secs,
            self.state,
            self.sample_count
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Initial load still running.
    Loading,
    /// Nothing to plot. `reason` carries a load failure, if any.
    NoData { reason: Option<String> },
    Devices(Vec<DeviceCard>),
}

/// Everything needed to paint one screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub body: Body,
    pub status: StatusLine,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

pub struct Dashboard<S> {
    config: DashboardConfig,
    live: bool,
    /// Held by the loader until the initial load finishes.
    ingestor: Option<Ingestor<S>>,
    index: SeriesIndex,
    window: ViewWindow,
    mode: RenderMode,
    paused: bool,
    loading: bool,
    running: bool,
    load_error: Option<String>,
    redraw: RedrawGate,
}

impl<S: LogSource> Dashboard<S> {
    /// A dashboard in the loading state. The window ends at `now` until data
    /// arrives.
    pub fn new(config: DashboardConfig, live: bool, now: NaiveDateTime) -> Self {
        let window = ViewWindow::initial(None, now, config.window());
        Self {
            mode: config.render_mode,
            config,
            live,
            ingestor: None,
            index: SeriesIndex::new(),
            window,
            paused: false,
            loading: true,
            running: true,
            load_error: None,
            redraw: RedrawGate::new(),
        }
    }

    /// Install the result of the initial load.
    pub fn on_loaded(&mut self, loaded: Loaded<S>, now: NaiveDateTime) {
        self.load_error = loaded.error.map(|e| e.to_string());
        self.index = loaded.index;
        self.ingestor = Some(loaded.ingestor);
        self.loading = false;
        self.window = ViewWindow::initial(self.index.bounds(), now, self.config.window());
        log::info!(
            "loaded {} sample(s) from {} device(s)",
            self.index.len(),
            self.index.device_count()
        );
        self.redraw.request();
    }

    /// The loader died without a result. Continue with nothing loaded.
    pub fn on_load_lost(&mut self) {
        log::error!("initial load worker exited without a result");
        self.loading = false;
        self.load_error = Some("log loader stopped unexpectedly".into());
        self.redraw.request();
    }

    /// Live refresh: ingest new rows and keep a following window on the
    /// newest sample. Does nothing while paused, loading or static.
    pub fn on_tick(&mut self) {
        if self.paused || self.loading || !self.live {
            return;
        }
        let Some(ingestor) = self.ingestor.as_mut() else {
            return;
        };

        match ingestor.poll() {
            Ok(Update::Append(batch)) => {
                if !batch.is_empty() {
                    let rejected = self.index.extend(batch);
                    ingestor.record_rejected(rejected);
                }
                self.load_error = None;
            }
            Ok(Update::Rebuild(batch)) => {
                let rejected = self.index.rebuild_from(batch);
                ingestor.record_rejected(rejected);
                self.load_error = None;
            }
            Err(e) => {
                log::warn!("live update failed: {e}");
                self.load_error = Some(e.to_string());
            }
        }

        self.window = self.window.live_tick(self.index.bounds());
        self.redraw.request();
    }

    /// Apply one user action. Navigation without data is ignored.
    pub fn apply(&mut self, action: Action, now: NaiveDateTime) {
        let bounds = self.index.bounds();
        let before = self.window;
        self.window = match action {
            Action::PanLeft => before.pan(PanDirection::Backward, bounds),
            Action::PanRight => before.pan(PanDirection::Forward, bounds),
            Action::ZoomIn => before.zoom(ZOOM_IN, bounds),
            Action::ZoomOut => before.zoom(ZOOM_OUT, bounds),
            Action::JumpStart => before.jump_start(bounds),
            Action::JumpEnd => before.jump_end(bounds),
            Action::Reset => before.reset(bounds, now, self.config.window()),
            // A static log has nothing to pause.
            Action::TogglePause if !self.live => before,
            Action::TogglePause => {
                self.paused = !self.paused;
                self.redraw.request();
                before
            }
            Action::ToggleMode => {
                self.mode = self.mode.toggle();
                self.redraw.request();
                before
            }
            Action::Quit => {
                self.running = false;
                before
            }
        };
        if self.window != before {
            self.redraw.request();
        }
    }

    /// Ask for a repaint without changing state, e.g. after a resize.
    pub fn request_redraw(&mut self) {
        self.redraw.request();
    }

    /// True once per batch of redraw requests.
    pub fn take_redraw(&mut self) -> bool {
        self.redraw.take()
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn window(&self) -> ViewWindow {
        self.window
    }

    pub fn index(&self) -> &SeriesIndex {
        &self.index
    }

    pub fn render_mode(&self) -> RenderMode {
        self.mode
    }

    pub fn stats(&self) -> Option<&IngestStats> {
        self.ingestor.as_ref().map(Ingestor::stats)
    }

    pub fn live_state(&self) -> LiveState {
        if self.paused {
            LiveState::Paused
        } else if !self.live {
            LiveState::Static
        } else if self.window.following {
            LiveState::Live
        } else {
            LiveState::History
        }
    }

    pub fn status_line(&self) -> StatusLine {
        let w = self.window;
        StatusLine {
            start: w.start,
            end: w.end,
            duration_secs: w.duration().num_seconds(),
            sample_count: self.index.count_in(w.start, w.end),
            state: self.live_state(),
            mode: self.mode,
            dropped: self.stats().map_or(0, IngestStats::dropped),
        }
    }

    /// Describe the current screen.
    pub fn frame(&self, spec: FrameSpec) -> Frame {
        let body = if self.loading {
            Body::Loading
        } else if self.index.device_count() == 0 {
            Body::NoData {
                reason: self.load_error.clone(),
            }
        } else {
            Body::Devices(
                self.index
                    .devices()
                    .map(|device| self.device_card(device, spec))
                    .collect(),
            )
        };
        Frame {
            body,
            status: self.status_line(),
        }
    }

    fn device_card(&self, device: DeviceId, spec: FrameSpec) -> DeviceCard {
        let w = self.window;
        let visible = self.index.range_query(device, w.start, w.end);
        let latest = visible.last().or_else(|| self.index.latest(device)).cloned();

        let gauges = latest
            .as_ref()
            .map(|s| {
                Metric::ALL
                    .iter()
                    .map(|&metric| {
                        let value = metric.value_from(s);
                        let max = self.gauge_max(metric, s);
                        GaugeReading {
                            metric,
                            value,
                            max,
                            gauge: gauge(value, max, spec.gauge_width),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let process_label = visible
            .iter()
            .rev()
            .map(|s| s.process_label.as_str())
            .find(|label| !label.is_empty())
            .map(str::to_string);
        let utilization: Vec<f64> = visible.iter().map(|s| s.utilization_pct).collect();

        DeviceCard {
            device,
            activity: latest.as_ref().map(|s| Activity::from_utilization(s.utilization_pct)),
            latest,
            process_label,
            trend: sparkline(&utilization, spec.gauge_width * 2),
            gauges,
            plots: self
                .config
                .metrics
                .iter()
                .map(|&metric| self.plot(metric, visible, spec))
                .collect(),
        }
    }

    fn plot(&self, metric: Metric, visible: &[Sample], spec: FrameSpec) -> Plot {
        let values: Vec<f64> = visible.iter().map(|s| metric.value_from(s)).collect();
        let scale = self
            .config
            .color_columns
            .then(|| self.config.scales.for_metric(metric));
        let average = (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);
        Plot {
            metric,
            raster: rasterize(&values, spec.plot_width, spec.plot_height, self.mode, scale),
            axis: Axis::of(&values),
            current: values.last().copied(),
            average,
            first: visible.first().map(|s| s.timestamp),
            last: visible.last().map(|s| s.timestamp),
        }
    }

    fn gauge_max(&self, metric: Metric, sample: &Sample) -> f64 {
        match metric {
            Metric::Utilization => 100.0,
            Metric::Memory => sample.memory_total / 1024.0,
            Metric::Temperature => TEMPERATURE_GAUGE_MAX,
            Metric::Power => self.config.scales.power.ceiling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::MemorySource;
    use crate::loader::load;
    use crate::raster::Tier;
    use chrono::{NaiveDate, TimeDelta};

    const HEADER: &str = "timestamp,device_id,utilization_pct,memory_used,memory_total,temperature,power_draw,process_label\n";

    fn t(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + TimeDelta::seconds(secs)
    }

    fn row(secs: i64, device: u32, util: f64, label: &str) -> String {
        format!(
            "{},{device},{util},40960,81920,60,250,{label}\n",
            t(secs).format("%Y/%m/%d %H:%M:%S%.3f")
        )
    }

    fn log(rows: impl IntoIterator<Item = String>) -> String {
        let mut text = HEADER.to_string();
        rows.into_iter().for_each(|r| text.push_str(&r));
        text
    }

    fn loaded(source: &MemorySource, live: bool) -> Dashboard<MemorySource> {
        let mut dash = Dashboard::new(DashboardConfig::default(), live, t(99_999));
        dash.on_loaded(load(Ingestor::new(source.clone()), !live), t(99_999));
        dash
    }

    #[test]
    fn loading_state_before_data() {
        let dash: Dashboard<MemorySource> = Dashboard::new(DashboardConfig::default(), true, t(1_000));
        let frame = dash.frame(FrameSpec::default());
        assert_eq!(frame.body, Body::Loading);
        assert_eq!(frame.status.end, t(1_000));
        assert_eq!(frame.status.duration_secs, 300);
    }

    #[test]
    fn empty_log_shows_no_data() {
        let dash = loaded(&MemorySource::new(HEADER), false);
        assert_eq!(dash.frame(FrameSpec::default()).body, Body::NoData { reason: None });
        assert_eq!(dash.status_line().end, t(99_999));
    }

    #[test]
    fn window_starts_at_newest_sample() {
        let source = MemorySource::new(&log((0..600).map(|i| row(i, 0, 50.0, ""))));
        let dash = loaded(&source, true);
        let status = dash.status_line();
        assert_eq!(status.end, t(599));
        assert_eq!(status.start, t(299));
        assert_eq!(status.state, LiveState::Live);
        // Both window edges are inclusive.
        assert_eq!(status.sample_count, 301);
    }

    #[test]
    fn cards_per_device_with_configured_plots() {
        let source = MemorySource::new(&log((0..10).flat_map(|i| {
            [row(i, 0, 10.0, "train.py"), row(i, 2, 95.0, "")]
        })));
        let dash = loaded(&source, false);
        let Body::Devices(cards) = dash.frame(FrameSpec::default()).body else {
            panic!("expected device cards");
        };
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].device, 0);
        assert_eq!(cards[0].activity, Some(Activity::Idle));
        assert_eq!(cards[0].process_label.as_deref(), Some("train.py"));
        assert_eq!(cards[1].activity, Some(Activity::High));
        assert_eq!(cards[1].process_label, None);
        assert_eq!(cards[0].trend.chars().count(), 16);

        assert_eq!(cards[0].gauges.len(), 4);
        let mem = &cards[0].gauges[1];
        assert_eq!(mem.metric, Metric::Memory);
        assert_eq!((mem.value, mem.max), (40.0, 80.0));

        assert_eq!(cards[0].plots.len(), 1);
        let plot = &cards[0].plots[0];
        assert_eq!(plot.metric, Metric::Memory);
        assert_eq!(plot.current, Some(40.0));
        assert_eq!(plot.first, Some(t(0)));
        assert_eq!(plot.last, Some(t(9)));
        assert!(plot.raster.grid().is_some());
    }

    #[test]
    fn plot_colors_follow_config() {
        let source = MemorySource::new(&log((0..4).map(|i| row(i, 0, 90.0, ""))));
        let mut config = DashboardConfig::default();
        config.metrics = vec![Metric::Utilization];
        let mut dash = Dashboard::new(config, false, t(0));
        dash.on_loaded(load(Ingestor::new(source), true), t(0));

        let Body::Devices(cards) = dash.frame(FrameSpec::default()).body else {
            panic!("expected device cards");
        };
        let grid = cards[0].plots[0].raster.grid().unwrap();
        assert_eq!(grid.tiers().unwrap()[0], Tier::High);
    }

    #[test]
    fn live_tick_ingests_and_follows() {
        let source = MemorySource::new(&log((0..10).map(|i| row(i, 0, 10.0, ""))));
        let mut dash = loaded(&source, true);
        assert!(dash.take_redraw());

        source.append(&row(10, 0, 20.0, ""));
        source.append(&row(11, 1, 30.0, ""));
        dash.on_tick();
        assert!(dash.take_redraw());
        assert_eq!(dash.index().len(), 12);
        assert_eq!(dash.index().device_count(), 2);
        assert_eq!(dash.window().end, t(11));
    }

    #[test]
    fn paused_tick_neither_ingests_nor_redraws() {
        let source = MemorySource::new(&log((0..10).map(|i| row(i, 0, 10.0, ""))));
        let mut dash = loaded(&source, true);
        dash.apply(Action::TogglePause, t(0));
        assert_eq!(dash.live_state(), LiveState::Paused);
        dash.take_redraw();

        source.append(&row(10, 0, 20.0, ""));
        dash.on_tick();
        assert!(!dash.take_redraw());
        assert_eq!(dash.index().len(), 10);
        assert_eq!(dash.window().end, t(9));

        dash.apply(Action::TogglePause, t(0));
        dash.on_tick();
        assert_eq!(dash.index().len(), 11);
    }

    #[test]
    fn static_view_ignores_ticks() {
        let source = MemorySource::new(&log((0..10).map(|i| row(i, 0, 10.0, ""))));
        let mut dash = loaded(&source, false);
        dash.take_redraw();
        source.append(&row(10, 0, 20.0, ""));
        dash.on_tick();
        assert!(!dash.take_redraw());
        assert_eq!(dash.live_state(), LiveState::Static);
    }

    #[test]
    fn static_view_cannot_pause() {
        let source = MemorySource::new(&log((0..10).map(|i| row(i, 0, 10.0, ""))));
        let mut dash = loaded(&source, false);
        dash.take_redraw();
        dash.apply(Action::TogglePause, t(0));
        assert!(!dash.is_paused());
        assert_eq!(dash.live_state(), LiveState::Static);
        assert!(!dash.take_redraw());
    }

    #[test]
    fn history_until_caught_up() {
        let source = MemorySource::new(&log((0..600).map(|i| row(i, 0, 10.0, ""))));
        let mut dash = loaded(&source, true);
        dash.apply(Action::PanLeft, t(0));
        assert_eq!(dash.live_state(), LiveState::History);

        // New data does not move a window the user has scrolled away from.
        let before = dash.window();
        source.append(&row(600, 0, 10.0, ""));
        dash.on_tick();
        assert_eq!(dash.window(), before);

        dash.apply(Action::JumpEnd, t(0));
        assert_eq!(dash.live_state(), LiveState::Live);
        assert_eq!(dash.window().end, t(600));
    }

    #[test]
    fn truncated_log_is_rebuilt_on_tick() {
        let source = MemorySource::new(&log((0..50).map(|i| row(i, 0, 10.0, ""))));
        let mut dash = loaded(&source, true);
        source.replace(&log([row(1_000, 3, 10.0, "")]));
        dash.on_tick();
        assert_eq!(dash.index().len(), 1);
        assert_eq!(dash.window().end, t(1_000));
        assert_eq!(dash.stats().unwrap().rebuilds, 1);
        // Devices seen before the rotation keep their card.
        assert_eq!(dash.index().devices().collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn navigation_without_data_is_ignored() {
        let mut dash = loaded(&MemorySource::new(HEADER), true);
        dash.take_redraw();
        let before = dash.window();
        dash.apply(Action::PanLeft, t(0));
        dash.apply(Action::ZoomIn, t(0));
        assert_eq!(dash.window(), before);
        assert!(!dash.take_redraw());
    }

    #[test]
    fn toggle_mode_and_quit() {
        let mut dash = loaded(&MemorySource::new(HEADER), false);
        assert_eq!(dash.render_mode(), RenderMode::Filled);
        dash.apply(Action::ToggleMode, t(0));
        assert_eq!(dash.render_mode(), RenderMode::Line);
        assert!(dash.is_running());
        dash.apply(Action::Quit, t(0));
        assert!(!dash.is_running());
    }

    #[test]
    fn lost_loader_leaves_no_data_with_reason() {
        let mut dash: Dashboard<MemorySource> = Dashboard::new(DashboardConfig::default(), true, t(0));
        dash.on_load_lost();
        assert!(!dash.is_loading());
        assert!(matches!(
            dash.frame(FrameSpec::default()).body,
            Body::NoData { reason: Some(_) }
        ));
    }

    #[test]
    fn status_line_text() {
        let source = MemorySource::new(&log((0..600).map(|i| row(i, 0, 10.0, ""))));
        let dash = loaded(&source, true);
        assert_eq!(
            dash.status_line().to_string(),
            "00:04:59 → 00:09:59  300s │ LIVE │ 301 samples"
        );
    }

    #[test]
    fn activity_thresholds() {
        assert_eq!(Activity::from_utilization(30.0), Activity::Idle);
        assert_eq!(Activity::from_utilization(30.5), Activity::Active);
        assert_eq!(Activity::from_utilization(80.0), Activity::Active);
        assert_eq!(Activity::from_utilization(80.1), Activity::High);
    }
}
