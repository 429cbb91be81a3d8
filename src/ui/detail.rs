//! Detail overlay rendering.
//!
//! Displays a modal overlay with detailed information about a selected node:
//! identity, reporting status, per-host metrics, and recent check results.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::data::{EnrichedNode, MetricValue, Severity};
use crate::ui::status::format_elapsed;

/// Minimum width required for the detail overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 50;
/// Minimum height required for the detail overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 16;

/// Render the node detail as a modal overlay.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    // Skip rendering if terminal is too small for the overlay
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }

    let Some(node) = app.get_selected_node() else {
        return;
    };

    // Width: 95% of screen, clamped to [MIN_OVERLAY_WIDTH, 100]
    let overlay_width = (area.width * 95 / 100).clamp(MIN_OVERLAY_WIDTH, 100);
    // Height: 90% of screen, clamped to [MIN_OVERLAY_HEIGHT, 50]
    let overlay_height = (area.height * 90 / 100).clamp(MIN_OVERLAY_HEIGHT, 50);

    let x = area.x + (area.width.saturating_sub(overlay_width)) / 2;
    let y = area.y + (area.height.saturating_sub(overlay_height)) / 2;
    let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let chunks = Layout::vertical([
        Constraint::Length(6), // Header with node identity
        Constraint::Min(8),    // Content (host metrics / check details)
        Constraint::Length(1), // Footer
    ])
    .split(overlay_area);

    render_header(frame, app, node, chunks[0]);

    let content_chunks = Layout::vertical([
        Constraint::Percentage(40), // Per-host metrics
        Constraint::Percentage(60), // Recent check results
    ])
    .split(chunks[1]);

    render_host_metrics(frame, app, node, content_chunks[0]);
    render_check_details(frame, app, node, content_chunks[1]);

    let footer = Paragraph::new(" Esc/Enter/q: close   ↑↓: other nodes ")
        .style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(footer, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, node: &EnrichedNode, area: Rect) {
    let status_style = app.theme.status_style(node.status);
    let status_label = match node.status {
        Some(s) => s.to_string(),
        None => "no telemetry".to_string(),
    };

    let gps = match (node.lat, node.lng) {
        (Some(lat), Some(lng)) => {
            let origin = if node.has_static_gps { "static" } else { "live" };
            format!("{:.4}, {:.4} ({})", lat, lng, origin)
        }
        _ => "-".to_string(),
    };

    let header_lines = vec![
        Line::from(vec![
            Span::styled(
                format!(" {} ", node.inventory.vsn),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("({})", node.inventory.id)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::raw(" Status: "),
            Span::styled(status_label, status_style.add_modifier(Modifier::BOLD)),
            Span::raw("    Project: "),
            Span::raw(node.inventory.project.clone().unwrap_or_else(|| "-".to_string())),
            Span::raw("    Temp: "),
            Span::raw(
                node.temperature.map(|t| format!("{:.1}°C", t)).unwrap_or_else(|| "-".to_string()),
            ),
        ]),
        Line::from(vec![
            Span::raw(" GPS: "),
            Span::raw(gps),
            Span::raw("    IP: "),
            Span::raw(node.ip.clone().unwrap_or_else(|| "-".to_string())),
        ]),
    ];

    let header_block = Block::default()
        .title(" Node Detail ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    frame.render_widget(Paragraph::new(header_lines).block(header_block), area);
}

fn render_host_metrics(frame: &mut Frame, app: &App, node: &EnrichedNode, area: Rect) {
    let header = Row::new(vec![
        Cell::from("Host"),
        Cell::from("Elapsed"),
        Cell::from("Uptime"),
        Cell::from("Mem free"),
        Cell::from("Mem total"),
    ])
    .style(app.theme.header);

    // One row per host alias seen in any per-host map
    let mut aliases: Vec<&String> = node
        .elapsed_times
        .keys()
        .chain(node.uptimes.keys())
        .chain(node.mem_free.keys())
        .collect();
    aliases.sort();
    aliases.dedup();

    let rows: Vec<Row> = aliases
        .iter()
        .map(|alias| {
            let elapsed = node
                .elapsed_times
                .get(*alias)
                .map(|ms| format_elapsed(*ms))
                .unwrap_or_else(|| "-".to_string());
            let elapsed_style = match node.elapsed_times.get(*alias) {
                Some(ms) if *ms > app.settings.thresholds.fail_ms => {
                    Style::default().fg(app.theme.critical)
                }
                Some(ms) if *ms > app.settings.thresholds.warn_ms => {
                    Style::default().fg(app.theme.warning)
                }
                _ => Style::default(),
            };

            Row::new(vec![
                Cell::from(alias.as_str()),
                Cell::from(elapsed).style(elapsed_style),
                Cell::from(format_uptime(node.uptimes.get(*alias))),
                Cell::from(format_bytes(node.mem_free.get(*alias))),
                Cell::from(format_bytes(node.mem_total.get(*alias))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(8),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(" Hosts ")
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );
    frame.render_widget(table, area);
}

fn render_check_details(frame: &mut Frame, app: &App, node: &EnrichedNode, area: Rect) {
    let sanity = &node.health.sanity;
    let health = &node.health.health;

    let title = format!(
        " Checks │ sanity {}✓ {}✗ │ health {}✓ {}✗ ",
        sanity.passed, sanity.failed, health.passed, health.failed
    );

    let header = Row::new(vec![
        Cell::from("Time"),
        Cell::from("Check"),
        Cell::from("Value"),
        Cell::from("Severity"),
    ])
    .style(app.theme.header);

    // Newest first; the rollup keeps details in timestamp order
    let rows: Vec<Row> = sanity
        .details
        .iter()
        .rev()
        .map(|r| {
            let failed = r.value.as_f64().is_some_and(|v| v > 0.0);
            let severity = match r.meta.severity {
                Some(Severity::Fatal) => "fatal",
                Some(Severity::Warning) => "warning",
                None => "-",
            };
            let style = if failed {
                match r.meta.severity {
                    Some(Severity::Warning) => Style::default().fg(app.theme.warning),
                    _ => Style::default().fg(app.theme.critical),
                }
            } else {
                Style::default().fg(app.theme.healthy)
            };

            Row::new(vec![
                Cell::from(r.timestamp.format("%m/%d %H:%M:%S").to_string()),
                Cell::from(r.name.clone()),
                Cell::from(r.value.to_string()).style(style),
                Cell::from(severity),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(15),
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Min(9),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );
    frame.render_widget(table, area);
}

fn format_uptime(value: Option<&MetricValue>) -> String {
    match value.and_then(MetricValue::as_f64) {
        Some(secs) => format_elapsed((secs * 1000.0) as i64),
        None => "-".to_string(),
    }
}

fn format_bytes(value: Option<&MetricValue>) -> String {
    let Some(n) = value.and_then(MetricValue::as_f64) else {
        return "-".to_string();
    };
    if n >= 1e9 {
        format!("{:.1}G", n / 1e9)
    } else if n >= 1e6 {
        format!("{:.1}M", n / 1e6)
    } else if n >= 1e3 {
        format!("{:.1}K", n / 1e3)
    } else {
        format!("{:.0}", n)
    }
}
