//! TUI rendering — one card per GPU.
//!
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ◈ gpuwatch  │  2 GPUs  │  gpu_20240301_120000.csv  │ ● LIVE  │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │ GPU 0 │ ● HIGH               │ GPU 1 │ ● IDLE                │
//! │ ⚙ python train.py            │                               │
//! │ GPU ██████░░  87% │ MEM ...  │ GPU █░░░░░░░   4% │ MEM ...   │
//! │ MEM 40.0GB  avg:38.2GB       │ MEM 1.2GB  avg:1.2GB          │
//! │   80.0│┌──────────────────┐  │   ...                         │
//! │       │⣀⣤⣶⣿⣿⣿⣿⣿⣿⣿⣿⣿⣿⣿⣿⣿⣿│  │                               │
//! ├──────────────────────────────┴───────────────────────────────┤
//! │ 12:00:00 → 12:05:00  300s │ LIVE │ 602 samples               │
//! │ ←→ pan  +- zoom  g/G start/end  r reset  space pause  q quit │
//! └──────────────────────────────────────────────────────────────┘

use super::app::App;
use gpuwatch_core::{
    Activity, Body, DeviceCard, FrameSpec, GaugeReading, LiveState, Metric, Plot, Tier,
};
use ratatui::{prelude::*, widgets::*};

/// Narrowest card that still fits gauges side by side.
const MIN_CARD_WIDTH: u16 = 60;
/// Y axis label column, including the `│`.
const AXIS_WIDTH: usize = 8;
/// Header, process and two gauge rows.
const CARD_HEADER_LINES: u16 = 4;
/// Title, top border, bottom border and time labels around each plot.
const PLOT_CHROME_LINES: u16 = 4;
const MIN_PLOT_HEIGHT: u16 = 2;
const GAUGE_WIDTH: usize = 8;

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(10),   // cards
            Constraint::Length(1), // status
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    draw_body(f, rows[1], app);
    draw_status(f, rows[2], app);
    draw_keys(f, rows[3]);
}

fn tier_color(tier: Tier) -> Color {
    match tier {
        Tier::Low => Color::Green,
        Tier::Mid => Color::Yellow,
        Tier::High => Color::Red,
    }
}

fn activity_color(activity: Activity) -> Color {
    match activity {
        Activity::Idle => Color::Green,
        Activity::Active => Color::Yellow,
        Activity::High => Color::Red,
    }
}

fn state_style(state: LiveState) -> (&'static str, Color) {
    match state {
        LiveState::Paused => ("▐▐ ", Color::Red),
        LiveState::Live => ("● ", Color::Green),
        LiveState::History => ("◆ ", Color::LightRed),
        LiveState::Static => ("◼ ", Color::Blue),
    }
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let dash = app.dashboard();
    let mut spans = vec![
        Span::styled(" ◈ gpuwatch ", Style::default().bold().fg(Color::Cyan)),
        Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{} GPUs", dash.index().device_count()),
            Style::default().fg(Color::Green),
        ),
        Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.log_name(), Style::default().fg(Color::Gray)),
    ];
    if dash.is_live() {
        spans.push(Span::styled("  │  ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled("● LIVE ", Style::default().fg(Color::Red)));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(spans));
    f.render_widget(block, area);
}

/// Grid shape and per-card budget for `count` cards in `area`.
fn layout_cards(area: Rect, count: usize, plots: usize) -> (u16, u16, FrameSpec) {
    let count = count.max(1) as u16;
    let cols = if area.width >= MIN_CARD_WIDTH * 2 && count > 1 {
        2
    } else {
        1
    };
    let grid_rows = count.div_ceil(cols);
    let card_width = area.width / cols;
    let card_height = area.height / grid_rows;

    let inner_height = card_height.saturating_sub(2 + CARD_HEADER_LINES);
    let per_plot = inner_height / plots.max(1) as u16;
    let plot_height = per_plot.saturating_sub(PLOT_CHROME_LINES).max(MIN_PLOT_HEIGHT);
    let plot_width = (card_width as usize).saturating_sub(2 + AXIS_WIDTH + 1).max(1);

    (
        cols,
        grid_rows,
        FrameSpec {
            plot_width,
            plot_height: plot_height as usize,
            gauge_width: GAUGE_WIDTH,
        },
    )
}

fn draw_body(f: &mut Frame, area: Rect, app: &App) {
    let dash = app.dashboard();
    let plots = dash.config().metrics.len();
    let (cols, grid_rows, spec) = layout_cards(area, dash.index().device_count(), plots);

    match dash.frame(spec).body {
        Body::Loading => {
            let p = Paragraph::new(format!("Loading {}…", app.log_name()))
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(p, area);
        }
        Body::NoData { reason } => {
            let mut lines = vec![Line::from(Span::styled(
                format!("No data in {}", app.log_name()),
                Style::default().fg(Color::DarkGray),
            ))];
            if let Some(reason) = reason {
                lines.push(Line::from(Span::styled(reason, Style::default().fg(Color::Red))));
            }
            if dash.is_live() {
                lines.push(Line::from("Waiting for the sampler to write rows…"));
            }
            let p = Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(p, area);
        }
        Body::Devices(cards) => {
            let row_areas = Layout::default()
                .direction(Direction::Vertical)
                .constraints(vec![Constraint::Ratio(1, grid_rows as u32); grid_rows as usize])
                .split(area);
            for (i, card) in cards.iter().enumerate() {
                let row = i / cols as usize;
                let col = i % cols as usize;
                let Some(&row_area) = row_areas.get(row) else {
                    break;
                };
                let col_areas = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints(vec![Constraint::Ratio(1, cols as u32); cols as usize])
                    .split(row_area);
                draw_card(f, col_areas[col], card);
            }
        }
    }
}

fn draw_card(f: &mut Frame, area: Rect, card: &DeviceCard) {
    let mut title = vec![Span::styled(
        format!(" GPU {} ", card.device),
        Style::default().bold().fg(Color::White),
    )];
    match card.activity {
        Some(activity) => {
            let color = activity_color(activity);
            title.push(Span::styled("│ ", Style::default().fg(Color::DarkGray)));
            title.push(Span::styled("● ", Style::default().bold().fg(color)));
            title.push(Span::styled(format!("{} ", activity.label()), Style::default().fg(color)));
        }
        None => title.push(Span::styled(
            "│ waiting for data ",
            Style::default().fg(Color::DarkGray).italic(),
        )),
    }
    if card.activity.is_some() {
        title.push(Span::styled(card.trend.clone(), Style::default().fg(Color::Cyan)));
        title.push(Span::raw(" "));
    }

    let mut lines = Vec::new();
    if let Some(label) = &card.process_label {
        lines.push(Line::from(vec![
            Span::styled(" ⚙ ", Style::default().fg(Color::DarkGray)),
            Span::styled(label.clone(), Style::default().fg(Color::Magenta)),
        ]));
    }
    for pair in card.gauges.chunks(2) {
        let mut spans = Vec::new();
        for (i, reading) in pair.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
            }
            spans.extend(gauge_spans(reading));
        }
        lines.push(Line::from(spans));
    }
    for plot in &card.plots {
        lines.extend(plot_lines(plot));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Line::from(title));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn gauge_spans(reading: &GaugeReading) -> Vec<Span<'static>> {
    let mut spans = vec![Span::styled(
        format!(" {} ", reading.metric.label()),
        Style::default().fg(Color::DarkGray),
    )];
    let color = match &reading.gauge {
        Some(g) => {
            let color = tier_color(g.tier);
            spans.push(Span::styled(g.filled.clone(), Style::default().fg(color)));
            spans.push(Span::styled(g.empty.clone(), Style::default().fg(Color::DarkGray)));
            color
        }
        None => Color::Gray,
    };
    let value = match reading.metric {
        Metric::Utilization => format!("{:4.0}%", reading.value),
        Metric::Memory => format!("{:4.0}G", reading.value),
        Metric::Temperature => format!("{:4.0}°", reading.value),
        Metric::Power => format!("{:4.0}W", reading.value),
    };
    spans.push(Span::styled(value, Style::default().bold().fg(color)));
    spans
}

fn format_value(metric: Metric, value: f64) -> String {
    format!("{value:.prec$}", prec = metric.precision())
}

fn plot_lines(plot: &Plot) -> Vec<Line<'static>> {
    let metric = plot.metric;
    let unit = metric.unit();
    let dim = Style::default().fg(Color::DarkGray);

    let Some(grid) = plot.raster.grid() else {
        return vec![Line::from(Span::styled(
            format!("  {}  no samples in view", metric.label()),
            dim,
        ))];
    };

    let mut lines = Vec::with_capacity(grid.height() + 4);

    let mut header = vec![Span::styled(format!("  {}", metric.label()), Style::default().bold())];
    if let Some(current) = plot.current {
        header.push(Span::styled(
            format!(" {:.1}{unit}", current),
            Style::default().bold().fg(Color::Cyan),
        ));
    }
    if let Some(avg) = plot.average {
        header.push(Span::styled(format!("  avg:{avg:.1}{unit}"), dim));
    }
    lines.push(Line::from(header));

    let axis = plot.axis;
    let label = |v: Option<f64>| v.map(|v| format_value(metric, v)).unwrap_or_default();
    let width = grid.width();
    let axis_pad = AXIS_WIDTH - 1;

    lines.push(Line::from(vec![
        Span::styled(format!("{:>axis_pad$}│", label(axis.map(|a| a.max))), dim),
        Span::styled(format!("┌{}┐", "─".repeat(width)), dim),
    ]));

    let mid_row = grid.height() / 2;
    for (r, row) in grid.rows().iter().enumerate() {
        let y_label = if r == mid_row {
            label(axis.map(|a| a.mid))
        } else {
            String::new()
        };
        let mut spans = vec![Span::styled(format!("{y_label:>axis_pad$}││"), dim)];
        spans.extend(row_spans(row, grid.tiers()));
        spans.push(Span::styled("│", dim));
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(vec![
        Span::styled(format!("{:>axis_pad$}│", label(axis.map(|a| a.min))), dim),
        Span::styled(format!("└{}┘", "─".repeat(width)), dim),
    ]));

    if let (Some(first), Some(last)) = (plot.first, plot.last) {
        let start = first.format("%H:%M:%S").to_string();
        let end = last.format("%H:%M:%S").to_string();
        let gap = (width + 2).saturating_sub(start.len() + end.len());
        lines.push(Line::from(Span::styled(
            format!("{}{start}{}{end}", " ".repeat(AXIS_WIDTH), " ".repeat(gap)),
            dim,
        )));
    }

    lines
}

/// Braille row split into runs of equal color.
fn row_spans(row: &str, tiers: Option<&[Tier]>) -> Vec<Span<'static>> {
    let Some(tiers) = tiers else {
        return vec![Span::styled(row.to_string(), Style::default().fg(Color::Cyan))];
    };

    let mut spans = Vec::new();
    let mut run = String::new();
    let mut run_tier: Option<Tier> = None;
    for (ch, &tier) in row.chars().zip(tiers) {
        if run_tier.is_some_and(|t| t != tier) {
            let color = run_tier.map_or(Color::Cyan, tier_color);
            spans.push(Span::styled(std::mem::take(&mut run), Style::default().fg(color)));
        }
        run_tier = Some(tier);
        run.push(ch);
    }
    if !run.is_empty() {
        let color = run_tier.map_or(Color::Cyan, tier_color);
        spans.push(Span::styled(run, Style::default().fg(color)));
    }
    spans
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let status = app.dashboard().status_line();
    let (icon, color) = state_style(status.state);
    let dim = Style::default().fg(Color::DarkGray);

    let mut spans = vec![
        Span::styled(
            format!(
                " {} → {}",
                status.start.format("%H:%M:%S"),
                status.end.format("%H:%M:%S")
            ),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(format!("  {}s", status.duration_secs), Style::default().fg(Color::Cyan)),
        Span::styled("  │  ", dim),
        Span::styled(icon, Style::default().fg(color)),
        Span::styled(status.state.label(), Style::default().fg(color)),
        Span::styled("  │  ", dim),
        Span::styled(format!("{} samples", status.sample_count), Style::default().fg(Color::Gray)),
        Span::styled("  │  ", dim),
        Span::styled(status.mode.label(), dim),
    ];
    if status.dropped > 0 {
        spans.push(Span::styled("  │  ", dim));
        spans.push(Span::styled(
            format!("{} dropped", status.dropped),
            Style::default().fg(Color::Yellow),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(
        " ←/h →/l pan   +/- zoom   g/G start/end   r reset   space pause   m mode   q quit",
    )
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuwatch_core::{Dashboard, DashboardConfig, FileSource, Ingestor, loader};
    use ratatui::backend::TestBackend;

    fn screen(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app_with_log(text: &str, live: bool) -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu_ui.csv");
        std::fs::write(&path, text).unwrap();
        let now = chrono::Local::now().naive_local();
        let mut dash = Dashboard::new(DashboardConfig::default(), live, now);
        dash.on_loaded(loader::load(Ingestor::new(FileSource::new(&path)), !live), now);
        (dir, App::from_parts(dash, None, "gpu_ui.csv".into()))
    }

    const HEADER: &str = "timestamp,device_id,utilization_pct,memory_used,memory_total,temperature,power_draw,process_label\n";

    #[test]
    fn renders_cards_and_status() {
        let mut text = HEADER.to_string();
        for i in 0..60 {
            text.push_str(&format!(
                "2024/01/01 00:{:02}:{:02},0,{},{},81920,60,200,python train.py\n",
                i / 60,
                i % 60,
                i,
                1024 * (i + 1)
            ));
        }
        let (_dir, app) = app_with_log(&text, false);
        let out = screen(&app, 100, 40);
        assert!(out.contains("GPU 0"));
        assert!(out.contains("python train.py"));
        assert!(out.contains("STATIC"));
        assert!(out.contains("60 samples"));
        assert!(out.chars().any(|c| ('\u{2801}'..='\u{28FF}').contains(&c)));
    }

    #[test]
    fn renders_no_data_state() {
        let (_dir, app) = app_with_log(HEADER, true);
        let out = screen(&app, 80, 20);
        assert!(out.contains("No data in gpu_ui.csv"));
        assert!(out.contains("LIVE"));
    }

    #[test]
    fn row_spans_group_equal_tiers() {
        let spans = row_spans("⣿⣿⣿", Some(&[Tier::Low, Tier::Low, Tier::High]));
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].content, "⣿⣿");
        assert_eq!(spans[1].style.fg, Some(Color::Red));
    }

    #[test]
    fn card_layout_uses_two_columns_when_wide() {
        let (cols, rows, spec) = layout_cards(Rect::new(0, 0, 140, 40), 3, 1);
        assert_eq!((cols, rows), (2, 2));
        assert!(spec.plot_width > 40);
        assert!(spec.plot_height >= MIN_PLOT_HEIGHT as usize);

        let (cols, rows, _) = layout_cards(Rect::new(0, 0, 80, 40), 3, 1);
        assert_eq!((cols, rows), (1, 3));
    }
}
