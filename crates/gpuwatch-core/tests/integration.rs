//! Integration tests for gpuwatch-core.
//!
//! These run the whole pipeline against real files:
//! log on disk → ingestor → index → view window → rasterizer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use gpuwatch_core::{
    Action, Body, Dashboard, DashboardConfig, FileSource, FrameSpec, Ingestor, LiveState, Metric,
    RenderMode, Tier, Update, ViewWindow, latest_log, loader, rasterize,
};

const HEADER: &str = "timestamp,device_id,utilization_pct,memory_used,memory_total,temperature,power_draw,process_label\n";

fn t(secs: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        + TimeDelta::seconds(secs)
}

fn row(secs: i64, device: u32, util: f64) -> String {
    format!(
        "{},{device},{util:.3},20480,81920,55,180.5,python train.py\n",
        t(secs).format("%Y/%m/%d %H:%M:%S%.3f")
    )
}

fn write_log(path: &Path, rows: impl IntoIterator<Item = String>) {
    let mut file = File::create(path).unwrap();
    file.write_all(HEADER.as_bytes()).unwrap();
    for r in rows {
        file.write_all(r.as_bytes()).unwrap();
    }
}

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

/// 600 one-second samples ramping linearly from 0 to 100 %.
fn ramp() -> impl Iterator<Item = String> {
    (0..600).map(|i| row(i, 0, i as f64 * 100.0 / 599.0))
}

#[test]
fn reset_window_shows_newest_five_minutes_of_ramp() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpu_20240301_120000.csv");
    write_log(&path, ramp());

    let loaded = loader::load(Ingestor::new(FileSource::new(&path)), true);
    assert!(loaded.error.is_none());
    let index = loaded.index;
    assert_eq!(index.len(), 600);

    let window = ViewWindow::initial(None, t(0), TimeDelta::seconds(300))
        .reset(index.bounds(), t(10_000), TimeDelta::seconds(300));
    assert!(window.following);
    assert_eq!(window.end, t(599));

    let visible = index.range_query(0, window.start, window.end);
    // Inclusive on both edges: 300 s spans 301 one-second samples.
    assert_eq!(visible.len(), 301);
    assert_eq!(visible.first().unwrap().timestamp, t(299));
    assert_eq!(visible.last().unwrap().timestamp, t(599));

    let values: Vec<f64> = visible.iter().map(|s| Metric::Utilization.value_from(s)).collect();
    let config = DashboardConfig::default();
    let raster = rasterize(
        &values,
        40,
        6,
        RenderMode::Filled,
        Some(config.scales.for_metric(Metric::Utilization)),
    );
    let grid = raster.grid().expect("ramp produces a grid");
    assert_eq!(grid.tiers().unwrap().last(), Some(&Tier::High));
}

#[test]
fn truncated_file_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpu_rotate.csv");
    write_log(&path, (0..100).map(|i| row(i, 0, 10.0)));

    let mut ingestor = Ingestor::new(FileSource::new(&path));
    assert_eq!(ingestor.load_all(false).unwrap().len(), 100);

    write_log(&path, [row(5_000, 1, 50.0), row(5_001, 1, 60.0)]);
    match ingestor.poll().unwrap() {
        Update::Rebuild(batch) => {
            assert_eq!(batch.len(), 2);
            assert!(batch.iter().all(|s| s.device_id == 1));
        }
        Update::Append(batch) => panic!("expected rebuild, got append of {}", batch.len()),
    }
}

#[test]
fn live_dashboard_follows_appended_rows_across_partial_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpu_live.csv");
    write_log(&path, (0..30).map(|i| row(i, 0, 20.0)));

    let mut dash = Dashboard::new(DashboardConfig::default(), true, t(0));
    let loaded = loader::Loader::spawn(Ingestor::new(FileSource::new(&path)), false)
        .wait()
        .expect("loader reports");
    dash.on_loaded(loaded, t(0));
    assert_eq!(dash.window().end, t(29));

    let next = row(30, 0, 90.0);
    let (head, tail) = next.split_at(next.len() / 2);
    append(&path, head);
    dash.on_tick();
    assert_eq!(dash.index().len(), 30, "half a row must not be ingested");

    append(&path, tail);
    dash.on_tick();
    assert_eq!(dash.index().len(), 31);
    assert_eq!(dash.window().end, t(30));
    assert_eq!(dash.live_state(), LiveState::Live);

    dash.apply(Action::ZoomIn, t(0));
    assert_eq!(dash.window().duration(), TimeDelta::seconds(150));
    assert_eq!(dash.status_line().sample_count, 31);
}

#[test]
fn malformed_rows_are_skipped_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpu_dirty.csv");
    write_log(
        &path,
        [
            row(0, 0, 10.0),
            "not,a,sample\n".to_string(),
            row(1, 0, -5.0),
            row(2, 0, 30.0),
        ],
    );

    let mut dash = Dashboard::new(DashboardConfig::default(), false, t(0));
    dash.on_loaded(loader::load(Ingestor::new(FileSource::new(&path)), true), t(0));
    assert_eq!(dash.index().len(), 2);
    assert_eq!(dash.status_line().dropped, 2);
}

#[test]
fn missing_log_starts_with_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpu_missing.csv");

    let mut dash = Dashboard::new(DashboardConfig::default(), true, t(0));
    dash.on_loaded(loader::load(Ingestor::new(FileSource::new(&path)), false), t(0));
    assert!(matches!(
        dash.frame(FrameSpec::default()).body,
        Body::NoData { reason: Some(_) }
    ));

    // Once the sampler creates the file, the next tick picks it up.
    write_log(&path, [row(0, 4, 10.0)]);
    dash.on_tick();
    assert_eq!(dash.index().device_count(), 1);
    assert!(matches!(dash.frame(FrameSpec::default()).body, Body::Devices(_)));
}

#[test]
fn latest_log_feeds_the_viewer() {
    let dir = tempfile::tempdir().unwrap();
    write_log(&dir.path().join("gpu_a.csv"), [row(0, 0, 1.0)]);
    let newest = dir.path().join("gpu_b.csv");
    write_log(&newest, [row(0, 0, 1.0), row(1, 1, 2.0)]);
    let mtime = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
    File::options().write(true).open(&newest).unwrap().set_modified(mtime).unwrap();

    let entry = latest_log(dir.path()).unwrap().unwrap();
    assert_eq!(entry.path, newest);

    let loaded = loader::load(Ingestor::new(FileSource::new(&entry.path)), true);
    assert_eq!(loaded.index.device_count(), 2);
}

#[test]
fn config_file_drives_plots() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("gpuwatch.json");
    std::fs::write(
        &config_path,
        r#"{"metrics": ["utilization", "power"], "render_mode": "line", "window_secs": 60}"#,
    )
    .unwrap();
    let config = DashboardConfig::load(&config_path).unwrap();

    let log_path = dir.path().join("gpu_cfg.csv");
    write_log(&log_path, (0..120).map(|i| row(i, 0, 50.0)));

    let mut dash = Dashboard::new(config, false, t(0));
    dash.on_loaded(loader::load(Ingestor::new(FileSource::new(&log_path)), true), t(0));
    assert_eq!(dash.render_mode(), RenderMode::Line);
    assert_eq!(dash.window().duration(), TimeDelta::seconds(60));

    let Body::Devices(cards) = dash.frame(FrameSpec::default()).body else {
        panic!("expected device cards");
    };
    let metrics: Vec<Metric> = cards[0].plots.iter().map(|p| p.metric).collect();
    assert_eq!(metrics, vec![Metric::Utilization, Metric::Power]);
}
