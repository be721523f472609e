//! `gpuwatch list` — show telemetry logs available for viewing.

use std::path::Path;

use chrono::{DateTime, Local};
use gpuwatch_core::find_logs;

/// Run the list command.
pub fn run(dir: &Path) {
    let logs = match find_logs(dir) {
        Ok(logs) => logs,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", dir.display());
            std::process::exit(1);
        }
    };

    if logs.is_empty() {
        println!("No logs found in {}/", dir.display());
        println!("Start the sampler first; it writes gpu_<timestamp>.csv files there.");
        return;
    }

    println!("{:<40} {:>10} {:>20}", "Log", "Size", "Modified");
    println!("{}", "-".repeat(72));
    for log in &logs {
        let modified: DateTime<Local> = log.modified.into();
        println!(
            "{:<40} {:>10} {:>20}",
            log.file_name(),
            super::format_size(log.size),
            modified.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    println!();
    println!("{} log(s). Open the newest with: gpuwatch view --latest", logs.len());
}
