//! CLI for gpuwatch — browse and follow GPU telemetry logs in the terminal.

mod commands;
mod tui;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gpuwatch")]
#[command(about = "gpuwatch — live braille dashboards for GPU telemetry logs")]
#[command(version = gpuwatch_core::VERSION)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Append log output to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a log in the interactive dashboard
    View {
        /// Log file to open. Defaults to the newest log in --logs-dir.
        logfile: Option<PathBuf>,

        /// Open the most recently modified log
        #[arg(long, conflicts_with = "logfile")]
        latest: bool,

        /// Follow the file as the sampler appends to it
        #[arg(long)]
        live: bool,

        /// Plot GPU utilization
        #[arg(long, visible_alias = "show-gpu")]
        show_util: bool,

        /// Plot temperature
        #[arg(long)]
        show_temp: bool,

        /// Plot power draw
        #[arg(long)]
        show_power: bool,

        /// Plot every metric
        #[arg(long)]
        show_all: bool,

        /// Start in line mode instead of filled
        #[arg(long)]
        line: bool,

        /// Dashboard config (JSON)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Directory searched for gpu_*.csv logs
        #[arg(long, default_value = gpuwatch_core::DEFAULT_LOGS_DIR)]
        logs_dir: PathBuf,
    },

    /// List logs, oldest first
    List {
        /// Directory searched for gpu_*.csv logs
        #[arg(long, default_value = gpuwatch_core::DEFAULT_LOGS_DIR)]
        logs_dir: PathBuf,
    },
}

/// Route `log` output. The dashboard owns the terminal, so it only logs when
/// given a file.
fn init_logging(verbosity: u8, debug_log: Option<&Path>, owns_terminal: bool) {
    let log_level = match verbosity {
        0 if debug_log.is_some() => "info",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level));

    if let Some(path) = debug_log {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Cannot open debug log {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    } else if owns_terminal {
        builder.filter_level(log::LevelFilter::Off);
    }
    builder.init();
}

fn main() {
    let cli = Cli::parse();
    let owns_terminal = matches!(cli.command, Commands::View { .. });
    init_logging(cli.verbose, cli.debug_log.as_deref(), owns_terminal);

    match cli.command {
        Commands::View {
            logfile,
            latest,
            live,
            show_util,
            show_temp,
            show_power,
            show_all,
            line,
            config,
            logs_dir,
        } => commands::view::run(commands::view::ViewCommandConfig {
            logfile: logfile.as_deref(),
            latest,
            live,
            show_util,
            show_temp,
            show_power,
            show_all,
            line,
            config_path: config.as_deref(),
            logs_dir: &logs_dir,
        }),
        Commands::List { logs_dir } => commands::list::run(&logs_dir),
    }
}
