//! TUI application state and event loop.
//!
//! The bulk load runs on a worker thread so the first frame appears at once;
//! after that everything (input, live ticks, redraws) happens on this thread.
//! Frames are only painted when the dashboard asks for a redraw.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use gpuwatch_core::{
    Action, Dashboard, DashboardConfig, FileSource, Ingestor, LoadPoll, Loader, Ticker,
};

/// Upper bound on how long input polling blocks.
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Wall-clock time in the log's timezone.
fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Key binding table.
pub fn action_for(key: KeyCode) -> Option<Action> {
    match key {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Left | KeyCode::Char('h') => Some(Action::PanLeft),
        KeyCode::Right | KeyCode::Char('l') => Some(Action::PanRight),
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Char('k') => Some(Action::ZoomIn),
        KeyCode::Char('-') | KeyCode::Char('j') => Some(Action::ZoomOut),
        KeyCode::Home | KeyCode::Char('g') => Some(Action::JumpStart),
        KeyCode::End | KeyCode::Char('G') => Some(Action::JumpEnd),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::Reset),
        KeyCode::Char(' ') => Some(Action::TogglePause),
        KeyCode::Char('m') => Some(Action::ToggleMode),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    dashboard: Dashboard<FileSource>,
    /// Present until the initial load reports back.
    loader: Option<Loader<FileSource>>,
    ticker: Ticker,
    log_name: String,
}

impl App {
    pub fn new(path: PathBuf, config: DashboardConfig, live: bool) -> Self {
        let log_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let loader = Loader::spawn(Ingestor::new(FileSource::new(path)), !live);
        Self::from_parts(Dashboard::new(config, live, now()), Some(loader), log_name)
    }

    pub(crate) fn from_parts(
        dashboard: Dashboard<FileSource>,
        loader: Option<Loader<FileSource>>,
        log_name: String,
    ) -> Self {
        let ticker = Ticker::new(dashboard.config().tick_interval(), Instant::now());
        Self {
            dashboard,
            loader,
            ticker,
            log_name,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Install panic hook that restores terminal before printing the panic.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        // Always restore terminal, even if the loop returned an error.
        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        if let Some(stats) = self.dashboard.stats()
            && stats.dropped() > 0
        {
            eprintln!(
                "{} record(s) skipped ({} malformed, {} out of order)",
                stats.dropped(),
                stats.skipped,
                stats.rejected
            );
        }

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.dashboard.is_running() {
            self.poll_loader();

            if self.dashboard.take_redraw() {
                terminal.draw(|f| super::ui::draw(f, self))?;
            }

            let timeout = self.ticker.remaining(Instant::now()).min(INPUT_POLL);
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key.code);
                    }
                    Event::Resize(..) => self.dashboard.request_redraw(),
                    _ => {}
                }
            }

            if self.ticker.poll(Instant::now()) {
                self.dashboard.on_tick();
            }
        }

        // The loader, if still running, is abandoned with its channel.
        self.loader = None;
        Ok(())
    }

    fn poll_loader(&mut self) {
        let Some(loader) = &self.loader else { return };
        match loader.poll() {
            LoadPoll::Pending => {}
            LoadPoll::Ready(loaded) => {
                self.dashboard.on_loaded(*loaded, now());
                self.loader = None;
            }
            LoadPoll::Lost => {
                self.dashboard.on_load_lost();
                self.loader = None;
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        if let Some(action) = action_for(key) {
            self.dashboard.apply(action, now());
        }
    }

    // --- Accessors for the renderer ---

    pub fn dashboard(&self) -> &Dashboard<FileSource> {
        &self.dashboard
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }
}
