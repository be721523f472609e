//! `gpuwatch view` — interactive dashboard over one log.

use std::path::{Path, PathBuf};

use gpuwatch_core::{RenderMode, latest_log};

use super::{MetricFlags, load_config, resolve_metrics};

pub struct ViewCommandConfig<'a> {
    pub logfile: Option<&'a Path>,
    pub latest: bool,
    pub live: bool,
    pub show_util: bool,
    pub show_temp: bool,
    pub show_power: bool,
    pub show_all: bool,
    pub line: bool,
    pub config_path: Option<&'a Path>,
    pub logs_dir: &'a Path,
}

/// Run the view command.
pub fn run(cfg: ViewCommandConfig<'_>) {
    let mut config = load_config(cfg.config_path);
    config.metrics = resolve_metrics(
        &config.metrics,
        MetricFlags {
            util: cfg.show_util,
            temp: cfg.show_temp,
            power: cfg.show_power,
            all: cfg.show_all,
        },
    );
    if cfg.line {
        config.render_mode = RenderMode::Line;
    }

    let logfile = if cfg.latest { None } else { cfg.logfile };
    let path = match resolve_log(logfile, cfg.logs_dir) {
        Ok(path) => path,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    };
    log::info!(
        "viewing {} ({})",
        path.display(),
        if cfg.live { "live" } else { "static" }
    );

    let mut app = crate::tui::app::App::new(path, config, cfg.live);
    if let Err(e) = app.run() {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}

/// The explicit file if given, otherwise the newest log in `logs_dir`.
///
/// `--latest` and no file at all both land on the newest log. An explicit
/// file is not checked for existence: in live mode the sampler may create it
/// after the viewer starts.
fn resolve_log(logfile: Option<&Path>, logs_dir: &Path) -> Result<PathBuf, String> {
    if let Some(path) = logfile {
        return Ok(path.to_path_buf());
    }
    match latest_log(logs_dir) {
        Ok(Some(entry)) => Ok(entry.path),
        Ok(None) => Err(format!(
            "No logs found in {}/\nPass a log file or use --logs-dir.",
            logs_dir.display()
        )),
        Err(e) => Err(format!("Failed to read {}: {e}", logs_dir.display())),
    }
}
