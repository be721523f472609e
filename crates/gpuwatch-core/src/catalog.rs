//! Discovery of telemetry logs in a directory.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Directory searched when none is given.
pub const DEFAULT_LOGS_DIR: &str = "logs";

const LOG_PREFIX: &str = "gpu_";
const LOG_EXTENSION: &str = "csv";

/// One log file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl LogEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn is_log_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(LOG_PREFIX)
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(LOG_EXTENSION))
}

/// All `gpu_*.csv` files in `dir`, oldest first by modification time.
///
/// A missing directory is an empty catalog, not an error.
pub fn find_logs(dir: &Path) -> io::Result<Vec<LogEntry>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut logs = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !is_log_name(&path) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        logs.push(LogEntry {
            path,
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    logs.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(logs)
}

/// Most recently modified log in `dir`.
pub fn latest_log(dir: &Path) -> io::Result<Option<LogEntry>> {
    Ok(find_logs(dir)?.pop())
}
