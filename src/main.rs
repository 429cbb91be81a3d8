// Binary includes library modules - some public API items are only for library consumers
#![allow(unused)]

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};

mod app;
mod config;
mod data;
mod events;
mod source;
mod timeline;
mod ui;

use app::{App, View};
use config::Settings;
use data::{merge, parse_records, Debouncer, InventoryRow, SummaryByVsn};
use source::{DataSource, FileSource, StreamSource};
use timeline::CellUnit;

#[derive(Parser, Debug)]
#[command(name = "fleetwatch")]
#[command(about = "Operations dashboard for a distributed sensor-node fleet")]
struct Args {
    /// Path to an NDJSON metric records file
    #[arg(short, long, default_value = "records.ndjson", conflicts_with = "connect")]
    records: PathBuf,

    /// Connect to a TCP endpoint for live records (host:port)
    #[arg(short, long, conflicts_with = "records")]
    connect: Option<String>,

    /// Path to the fleet inventory file (JSON array of registered nodes)
    #[arg(short, long)]
    inventory: Option<PathBuf>,

    /// Path to a per-VSN health summary file, re-read on each refresh
    #[arg(long)]
    health: Option<PathBuf>,

    /// Path to a per-VSN sanity summary file, re-read on each refresh
    #[arg(long)]
    sanity: Option<PathBuf>,

    /// Path to a TOML settings file (thresholds, palette, host aliases)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Refresh interval in seconds
    #[arg(long, default_value = "5")]
    refresh: u64,

    /// Timeline cell unit (overrides the settings file)
    #[arg(long, value_enum)]
    cell_unit: Option<CellUnit>,

    /// Pin the timeline start (RFC 3339, overrides the data extent)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Pin the timeline end (RFC 3339, overrides the data extent)
    #[arg(long)]
    end: Option<DateTime<Utc>>,

    /// Timeline rows to draw before the reveal affordance (overrides settings)
    #[arg(long)]
    row_limit: Option<usize>,

    /// Export the joined fleet snapshot to a JSON file and exit
    #[arg(short, long, conflicts_with = "connect")]
    export: Option<PathBuf>,

    /// Write tracing output to this file (the terminal is busy)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(ref path) = args.log_file {
        init_tracing(path)?;
    }

    let mut settings = Settings::load(args.settings.as_deref())?;
    if let Some(unit) = args.cell_unit {
        settings.cell_unit = unit;
    }
    if let Some(limit) = args.row_limit {
        settings.row_limit = Some(limit);
    }

    let inventory = match args.inventory {
        Some(ref path) => load_inventory(path)?,
        None => Vec::new(),
    };

    // Handle export mode (non-interactive)
    if let Some(ref export_path) = args.export {
        return export_to_file(&args, export_path, &inventory, &settings);
    }

    // Handle TCP connection mode
    if let Some(ref addr) = args.connect {
        return run_with_tcp(addr, &args, inventory, settings);
    }

    // Default: file-based mode
    let source = Box::new(FileSource::new(&args.records));
    run_tui(source, &args, inventory, settings)
}

fn init_tracing(path: &Path) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(file)
        .with_ansi(false)
        .init();
    Ok(())
}

/// Load the fleet inventory (JSON array of registered nodes).
fn load_inventory(path: &Path) -> Result<Vec<InventoryRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read inventory {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("bad inventory file {}", path.display()))
}

/// Load an optional per-VSN summary file; absence degrades to None.
fn load_summary(path: Option<&Path>) -> Option<SummaryByVsn> {
    let path = path?;
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Run with a TCP stream data source
fn run_with_tcp(
    addr: &str,
    args: &Args,
    inventory: Vec<InventoryRow>,
    settings: Settings,
) -> Result<()> {
    // Build a tokio runtime for the TCP connection
    let rt = tokio::runtime::Runtime::new()?;

    let source = rt.block_on(async {
        use tokio::net::TcpStream;

        println!("Connecting to {}...", addr);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                println!("Connected!");
                Ok(Box::new(StreamSource::spawn(stream, addr)) as Box<dyn DataSource>)
            }
            Err(e) => Err(anyhow::anyhow!("Failed to connect to {}: {}", addr, e)),
        }
    })?;

    run_tui(source, args, inventory, settings)
}

/// Run the TUI with the given data source
fn run_tui(
    source: Box<dyn DataSource>,
    args: &Args,
    inventory: Vec<InventoryRow>,
    settings: Settings,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    // Create app and load initial data
    let mut app = App::new(source, settings)
        .with_inventory(inventory)
        .with_summaries(args.health.clone(), args.sanity.clone());
    app.timeline_config.start_time = args.start;
    app.timeline_config.end_time = args.end;
    let _ = app.reload_data();

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, Duration::from_secs(args.refresh));

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_refresh = Instant::now();
    let mut dirty = true;
    // Coalesce redraws while the terminal is being resized
    let mut resize_debounce = Debouncer::new(Duration::from_millis(200));

    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    while app.running {
        let now = Instant::now();

        // Step any in-flight pan/zoom transition
        if app.viewport.tick(now) {
            dirty = true;
        }
        if resize_debounce.poll_ready(now) {
            dirty = true;
        }

        if dirty {
            terminal.draw(|frame| {
                let area = frame.area();

                // Check for minimum terminal size
                if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                    let msg = format!(
                        "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                        area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                    );
                    let paragraph = ratatui::widgets::Paragraph::new(msg)
                        .alignment(ratatui::layout::Alignment::Center)
                        .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                    let centered = ratatui::layout::Rect::new(
                        0,
                        (area.height / 2).saturating_sub(2),
                        area.width,
                        5.min(area.height),
                    );
                    frame.render_widget(paragraph, centered);
                    return;
                }

                let chunks = Layout::vertical([
                    Constraint::Length(1), // Header bar
                    Constraint::Length(1), // Tabs
                    Constraint::Min(8),    // Content
                    Constraint::Length(1), // Status bar
                ])
                .split(area);

                ui::common::render_header(frame, app, chunks[0]);
                ui::common::render_tabs(frame, app, chunks[1]);

                match app.current_view {
                    View::Status => ui::status::render(frame, app, chunks[2]),
                    View::Timeline => ui::timeline_view::render(frame, app, chunks[2]),
                }

                ui::common::render_status_bar(frame, app, chunks[3]);

                if app.show_detail_overlay {
                    ui::detail::render_overlay(frame, app, area);
                }

                if app.show_help {
                    ui::common::render_help(frame, app, area);
                }
            })?;
            dirty = false;
        }

        // Poll for events with a short timeout
        if let Some(event) = events::poll_event(Duration::from_millis(50))? {
            match event {
                Event::Key(key) => {
                    events::handle_key_event(app, key);
                    dirty = true;
                }
                Event::Mouse(mouse) => {
                    // Content starts after header (1) + tabs (1) + table header (1)
                    events::handle_mouse_event(app, mouse, 3);
                    dirty = true;
                }
                Event::Resize(_, _) => {
                    resize_debounce.trigger();
                }
                _ => {}
            }
        }

        // Fixed-delay refresh: reschedule after every cycle, successful or
        // not. `app.running` is the cooperative cancellation check.
        if last_refresh.elapsed() >= refresh_interval {
            if let Ok(true) = app.reload_data() {
                dirty = true;
            }
            last_refresh = Instant::now();
        }
    }

    Ok(())
}

/// Join the records file with inventory and summaries, write the enriched
/// fleet snapshot as JSON, and exit.
fn export_to_file(
    args: &Args,
    export_path: &Path,
    inventory: &[InventoryRow],
    settings: &Settings,
) -> Result<()> {
    use std::io::Write;

    let content = std::fs::read_to_string(&args.records)
        .with_context(|| format!("cannot read records {}", args.records.display()))?;
    let records = parse_records(&content)?;

    let health = load_summary(args.health.as_deref());
    let sanity = load_summary(args.sanity.as_deref());

    let nodes = merge(
        inventory,
        &records,
        health.as_ref(),
        sanity.as_ref(),
        Utc::now(),
        settings,
    );

    let json = serde_json::to_string_pretty(&nodes)?;
    let mut file = std::fs::File::create(export_path)?;
    file.write_all(json.as_bytes())?;

    println!("Exported fleet snapshot to: {}", export_path.display());
    Ok(())
}
