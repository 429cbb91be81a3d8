//! Status view rendering.
//!
//! Displays a sortable, filterable table of all fleet nodes with their
//! reporting status, per-host heartbeat freshness, and check rollups.

use std::cmp::Ordering;

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::data::{EnrichedNode, ReportStatus};

/// Column to sort by in the Status view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    /// Sort by VSN alphabetically.
    #[default]
    Vsn,
    /// Sort by node id.
    Id,
    /// Sort by project.
    Project,
    /// Sort by reporting status (not-reporting first when descending).
    Status,
    /// Sort by the stalest host's elapsed time.
    Elapsed,
    /// Sort by core-board temperature.
    Temp,
}

impl SortColumn {
    /// Cycle to the next sort column.
    pub fn next(self) -> Self {
        match self {
            SortColumn::Vsn => SortColumn::Id,
            SortColumn::Id => SortColumn::Project,
            SortColumn::Project => SortColumn::Status,
            SortColumn::Status => SortColumn::Elapsed,
            SortColumn::Elapsed => SortColumn::Temp,
            SortColumn::Temp => SortColumn::Vsn,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortColumn::Vsn => "vsn",
            SortColumn::Id => "id",
            SortColumn::Project => "project",
            SortColumn::Status => "status",
            SortColumn::Elapsed => "elapsed",
            SortColumn::Temp => "temp",
        }
    }
}

/// Render the Status view showing all nodes in a sortable table.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let mut nodes: Vec<&EnrichedNode> =
        app.nodes.iter().filter(|n| app.matches_filter(n)).collect();
    sort_nodes_by(&mut nodes, app.sort_column, app.sort_ascending);

    let header = Row::new(vec![
        Cell::from(format_header("VSN", SortColumn::Vsn, app)),
        Cell::from(format_header("Node", SortColumn::Id, app)),
        Cell::from(format_header("Project", SortColumn::Project, app)),
        Cell::from(format_header("Status", SortColumn::Status, app)),
        Cell::from(format_header("Elapsed", SortColumn::Elapsed, app)),
        Cell::from(format_header("Temp", SortColumn::Temp, app)),
        Cell::from("Sanity"),
        Cell::from("Health"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = nodes
        .iter()
        .map(|n| {
            let status_style = app.theme.status_style(n.status);
            let status_text = match n.status {
                Some(s) => s.to_string(),
                None => "-".to_string(),
            };

            // Color the elapsed column by the worst host
            let worst = n.elapsed_times.values().copied().max();
            let elapsed_style = match worst {
                Some(ms) if ms > app.settings.thresholds.fail_ms => {
                    Style::default().fg(app.theme.critical)
                }
                Some(ms) if ms > app.settings.thresholds.warn_ms => {
                    Style::default().fg(app.theme.warning)
                }
                _ => Style::default(),
            };
            let elapsed_text = if n.elapsed_times.is_empty() {
                "-".to_string()
            } else {
                n.elapsed_times
                    .iter()
                    .map(|(alias, ms)| format!("{}:{}", alias, format_elapsed(*ms)))
                    .collect::<Vec<_>>()
                    .join(" ")
            };

            let sanity = &n.health.sanity;
            let sanity_style = if sanity.failed > 0 {
                Style::default().fg(app.theme.critical)
            } else {
                Style::default()
            };
            let health = &n.health.health;
            let health_style = if health.failed > 0 {
                Style::default().fg(app.theme.critical)
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(n.inventory.vsn.clone()),
                Cell::from(n.inventory.id.clone()),
                Cell::from(n.inventory.project.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(status_text).style(status_style),
                Cell::from(elapsed_text).style(elapsed_style),
                Cell::from(
                    n.temperature.map(|t| format!("{:.1}°C", t)).unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(format_rollup(sanity.passed, sanity.failed)).style(sanity_style),
                Cell::from(format_rollup(health.passed, health.failed)).style(health_style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(6),  // VSN
        Constraint::Fill(2), // Node id
        Constraint::Fill(1), // Project
        Constraint::Min(13), // Status
        Constraint::Fill(2), // Elapsed
        Constraint::Min(7),  // Temp
        Constraint::Min(7),  // Sanity
        Constraint::Min(7),  // Health
    ];

    let selected_visual_index = app.selected_node_index.min(nodes.len().saturating_sub(1));

    let sort_dir = if app.sort_ascending { "↑" } else { "↓" };

    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    let position_info = if !nodes.is_empty() {
        format!(" [{}/{}]", selected_visual_index + 1, nodes.len())
    } else {
        String::new()
    };

    let title = format!(
        " Nodes ({}/{}) [s:sort {}{}]{}{} ",
        nodes.len(),
        app.nodes.len(),
        app.sort_column.label(),
        sort_dir,
        filter_info,
        position_info
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(selected_visual_index));

    frame.render_stateful_widget(table, area, &mut state);
}

fn format_header(name: &str, col: SortColumn, app: &App) -> Span<'static> {
    if app.sort_column == col {
        let arrow = if app.sort_ascending { "↑" } else { "↓" };
        Span::raw(format!("{}{}", name, arrow))
    } else {
        Span::raw(name.to_string())
    }
}

/// Sort nodes by the given column and direction (public for use by App
/// when resolving the visual selection).
pub fn sort_nodes_by(nodes: &mut [&EnrichedNode], column: SortColumn, ascending: bool) {
    nodes.sort_by(|a, b| {
        let primary = match column {
            SortColumn::Vsn => a.inventory.vsn.cmp(&b.inventory.vsn),
            SortColumn::Id => a.inventory.id.cmp(&b.inventory.id),
            SortColumn::Project => a.inventory.project.cmp(&b.inventory.project),
            SortColumn::Status => status_rank(a.status).cmp(&status_rank(b.status)),
            SortColumn::Elapsed => max_elapsed(a).cmp(&max_elapsed(b)),
            SortColumn::Temp => a
                .temperature
                .partial_cmp(&b.temperature)
                .unwrap_or(Ordering::Equal),
        };

        let primary = if ascending { primary } else { primary.reverse() };

        // Secondary sort by VSN for stability when primary values are equal
        if primary == Ordering::Equal {
            a.inventory.vsn.cmp(&b.inventory.vsn)
        } else {
            primary
        }
    });
}

/// Ordering rank: reporting < never-joined < not-reporting, so descending
/// puts the problem nodes first.
fn status_rank(status: Option<ReportStatus>) -> u8 {
    match status {
        Some(ReportStatus::Reporting) => 0,
        None => 1,
        Some(ReportStatus::NotReporting) => 2,
    }
}

fn max_elapsed(node: &EnrichedNode) -> i64 {
    node.elapsed_times.values().copied().max().unwrap_or(-1)
}

fn format_rollup(passed: usize, failed: usize) -> String {
    if passed == 0 && failed == 0 {
        "-".to_string()
    } else {
        format!("{}/{}", passed, failed)
    }
}

/// Format milliseconds as a short human duration ("45s", "2m30s", "3h5m").
pub fn format_elapsed(ms: i64) -> String {
    if ms < 0 {
        return "-".to_string();
    }
    let secs = ms / 1000;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let (m, s) = (secs / 60, secs % 60);
        if s == 0 {
            format!("{}m", m)
        } else {
            format!("{}m{}s", m, s)
        }
    } else {
        let (h, m) = (secs / 3600, (secs % 3600) / 60);
        if m == 0 {
            format!("{}h", h)
        } else {
            format!("{}h{}m", h, m)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InventoryRow;

    fn node(vsn: &str, status: Option<ReportStatus>, elapsed_nx: Option<i64>) -> EnrichedNode {
        let mut n = EnrichedNode {
            inventory: InventoryRow {
                id: format!("id-{}", vsn),
                vsn: vsn.to_string(),
                ..InventoryRow::default()
            },
            status,
            ..EnrichedNode::default()
        };
        if let Some(ms) = elapsed_nx {
            n.elapsed_times.insert("nx".to_string(), ms);
        }
        n
    }

    #[test]
    fn test_sort_by_status_puts_problems_first_descending() {
        let a = node("W001", Some(ReportStatus::Reporting), Some(1000));
        let b = node("W002", Some(ReportStatus::NotReporting), Some(500_000));
        let c = node("W003", None, None);

        let mut rows = vec![&a, &b, &c];
        sort_nodes_by(&mut rows, SortColumn::Status, false);
        let vsns: Vec<&str> = rows.iter().map(|n| n.inventory.vsn.as_str()).collect();
        assert_eq!(vsns, vec!["W002", "W003", "W001"]);
    }

    #[test]
    fn test_sort_by_elapsed_uses_worst_host() {
        let mut a = node("W001", Some(ReportStatus::Reporting), Some(1_000));
        a.elapsed_times.insert("rpi".to_string(), 900_000);
        let b = node("W002", Some(ReportStatus::Reporting), Some(60_000));

        let mut rows = vec![&b, &a];
        sort_nodes_by(&mut rows, SortColumn::Elapsed, false);
        assert_eq!(rows[0].inventory.vsn, "W001");
    }

    #[test]
    fn test_sort_ties_break_by_vsn() {
        let a = node("W002", Some(ReportStatus::Reporting), None);
        let b = node("W001", Some(ReportStatus::Reporting), None);

        let mut rows = vec![&a, &b];
        sort_nodes_by(&mut rows, SortColumn::Status, true);
        assert_eq!(rows[0].inventory.vsn, "W001");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(45_000), "45s");
        assert_eq!(format_elapsed(150_000), "2m30s");
        assert_eq!(format_elapsed(120_000), "2m");
        assert_eq!(format_elapsed(11_100_000), "3h5m");
        assert_eq!(format_elapsed(-1), "-");
    }
}
