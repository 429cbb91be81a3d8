//! Application state and navigation logic.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use ratatui::layout::Rect;

use crate::config::Settings;
use crate::data::{merge, EnrichedNode, InventoryRow, MetricRecord, SummaryByVsn};
use crate::source::DataSource;
use crate::timeline::{
    PanDirection, TimelineConfig, TimelineData, ViewportState, ZoomDirection,
};
use crate::ui::status::SortColumn;
use crate::ui::Theme;

/// The current view/tab in the TUI.
///
/// Node detail is shown as an overlay (controlled by `App::show_detail_overlay`)
/// rather than as a separate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Sortable/filterable table of all fleet nodes.
    Status,
    /// Sanity-test matrix, one row per VSN.
    Timeline,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Status => View::Timeline,
            View::Timeline => View::Status,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        self.next()
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Status => "Status",
            View::Timeline => "Timeline",
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,
    pub show_detail_overlay: bool,

    // Data source and snapshots
    source: Box<dyn DataSource>,
    pub settings: Settings,
    pub inventory: Vec<InventoryRow>,
    pub records: Vec<MetricRecord>,
    pub nodes: Vec<EnrichedNode>,
    pub health_summary: Option<SummaryByVsn>,
    pub sanity_summary: Option<SummaryByVsn>,
    health_path: Option<PathBuf>,
    sanity_path: Option<PathBuf>,
    pub load_error: Option<String>,
    pub last_updated: Option<Instant>,

    // Timeline state; the viewport survives data refreshes untouched
    pub timeline_data: TimelineData,
    pub timeline_config: TimelineConfig,
    pub viewport: ViewportState,
    pub show_all_rows: bool,
    pub hover: Option<(u16, u16)>,
    pub drag_origin: Option<(u16, u16)>,
    /// Area the timeline view drew into last frame, for hit-testing.
    pub timeline_area: Option<Rect>,

    // Navigation state
    pub selected_node_index: usize,

    // Sorting (Status view)
    pub sort_column: SortColumn,
    pub sort_ascending: bool,

    // Search/filter
    pub filter_text: String,
    pub filter_active: bool,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App with the given data source and settings.
    pub fn new(source: Box<dyn DataSource>, settings: Settings) -> Self {
        let timeline_config = TimelineConfig {
            cell_unit: settings.cell_unit,
            start_time: None,
            end_time: None,
            tooltip_pos: settings.tooltip_pos,
            row_limit: settings.row_limit,
            palette: settings.palette.clone(),
        };
        let viewport = ViewportState::new(settings.scale_extent);

        Self {
            running: true,
            current_view: View::Status,
            show_help: false,
            show_detail_overlay: false,
            source,
            settings,
            inventory: Vec::new(),
            records: Vec::new(),
            nodes: Vec::new(),
            health_summary: None,
            sanity_summary: None,
            health_path: None,
            sanity_path: None,
            load_error: None,
            last_updated: None,
            timeline_data: TimelineData::default(),
            timeline_config,
            viewport,
            show_all_rows: false,
            hover: None,
            drag_origin: None,
            timeline_area: None,
            selected_node_index: 0,
            sort_column: SortColumn::default(),
            sort_ascending: true,
            filter_text: String::new(),
            filter_active: false,
            theme: Theme::auto_detect(),
            status_message: None,
        }
    }

    /// Set the fleet inventory, loaded once at startup by the host.
    pub fn with_inventory(mut self, inventory: Vec<InventoryRow>) -> Self {
        self.inventory = inventory;
        self
    }

    /// Set the paths of the per-VSN health and sanity summary files,
    /// re-read on every refresh.
    pub fn with_summaries(mut self, health: Option<PathBuf>, sanity: Option<PathBuf>) -> Self {
        self.health_path = health;
        self.sanity_path = sanity;
        self
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < std::time::Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Poll the data source for new records and rejoin.
    ///
    /// Returns Ok(true) if new data was received, Ok(false) if no new data,
    /// or Err if there was an error.
    pub fn reload_data(&mut self) -> Result<bool> {
        // Check for errors from the source
        if let Some(err) = self.source.error() {
            self.load_error = Some(err.to_string());
            return Ok(false);
        }

        // Poll for new data
        if let Some(records) = self.source.poll() {
            self.records = records;
            self.reload_summaries();
            self.rejoin();
            self.load_error = None;
            self.last_updated = Some(Instant::now());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Re-read the optional summary files. A missing or malformed file
    /// degrades to no summary rather than failing the refresh.
    fn reload_summaries(&mut self) {
        self.health_summary = self.health_path.as_deref().and_then(read_summary);
        self.sanity_summary = self.sanity_path.as_deref().and_then(read_summary);
    }

    /// Rebuild the joined snapshot and the timeline rows from the current
    /// records and summaries. Replaces both wholesale; never touches the
    /// viewport.
    fn rejoin(&mut self) {
        self.nodes = merge(
            &self.inventory,
            &self.records,
            self.health_summary.as_ref(),
            self.sanity_summary.as_ref(),
            Utc::now(),
            &self.settings,
        );

        let sanity = match &self.sanity_summary {
            Some(summary) => summary.clone(),
            // no summary file: derive rows from sanity records in the stream
            None => sanity_from_records(&self.records),
        };
        self.timeline_data = TimelineData::from_summary(&sanity);

        // Clamp selection indices
        let count = self.filtered_node_count();
        if self.selected_node_index >= count {
            self.selected_node_index = count.saturating_sub(1);
        }
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        let max = self.filtered_node_count().saturating_sub(1);
        self.selected_node_index = (self.selected_node_index + n).min(max);
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        self.selected_node_index = self.selected_node_index.saturating_sub(n);
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        self.selected_node_index = 0;
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        self.selected_node_index = self.filtered_node_count().saturating_sub(1);
    }

    /// Get count of nodes after applying the filter.
    pub fn filtered_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| self.matches_filter(n)).count()
    }

    /// The node under the current visual selection, after sort and filter.
    pub fn get_selected_node(&self) -> Option<&EnrichedNode> {
        let mut rows: Vec<&EnrichedNode> =
            self.nodes.iter().filter(|n| self.matches_filter(n)).collect();
        crate::ui::status::sort_nodes_by(&mut rows, self.sort_column, self.sort_ascending);
        rows.get(self.selected_node_index).copied()
    }

    /// Select the node with the given VSN, if it is in the filtered list.
    pub fn select_vsn(&mut self, vsn: &str) -> bool {
        let mut rows: Vec<&EnrichedNode> =
            self.nodes.iter().filter(|n| self.matches_filter(n)).collect();
        crate::ui::status::sort_nodes_by(&mut rows, self.sort_column, self.sort_ascending);
        if let Some(idx) = rows.iter().position(|n| n.inventory.vsn == vsn) {
            self.selected_node_index = idx;
            true
        } else {
            false
        }
    }

    /// Open the detail overlay for the currently selected node.
    pub fn enter_detail(&mut self) {
        if self.get_selected_node().is_some() {
            self.show_detail_overlay = true;
        }
    }

    /// Navigate back: close overlay first, then return to the Status view.
    pub fn go_back(&mut self) {
        if self.show_detail_overlay {
            self.show_detail_overlay = false;
            return;
        }
        if self.current_view != View::Status {
            self.current_view = View::Status;
        }
    }

    /// Close the detail overlay if open.
    pub fn close_overlay(&mut self) {
        self.show_detail_overlay = false;
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Cycle to the next sort column (Status view).
    pub fn cycle_sort(&mut self) {
        self.sort_column = self.sort_column.next();
    }

    /// Toggle sort direction between ascending and descending.
    pub fn toggle_sort_direction(&mut self) {
        self.sort_ascending = !self.sort_ascending;
    }

    /// Enter filter input mode (starts capturing keystrokes for search).
    pub fn start_filter(&mut self) {
        self.filter_active = true;
    }

    /// Exit filter input mode without clearing the filter text.
    pub fn cancel_filter(&mut self) {
        self.filter_active = false;
    }

    /// Clear the filter text and exit filter mode.
    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.filter_active = false;
    }

    /// Append a character to the filter text.
    pub fn filter_push(&mut self, c: char) {
        self.filter_text.push(c);
    }

    /// Remove the last character from the filter text.
    pub fn filter_pop(&mut self) {
        self.filter_text.pop();
    }

    /// Check if a node matches the current filter (VSN, id, or project).
    pub fn matches_filter(&self, node: &EnrichedNode) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        let search = self.filter_text.to_lowercase();
        node.inventory.vsn.to_lowercase().contains(&search)
            || node.inventory.id.to_lowercase().contains(&search)
            || node
                .inventory
                .project
                .as_deref()
                .is_some_and(|p| p.to_lowercase().contains(&search))
    }

    // Timeline gestures, delegated to the viewport.

    pub fn pan(&mut self, dir: PanDirection) {
        self.viewport.pan(dir);
    }

    pub fn zoom(&mut self, dir: ZoomDirection) {
        self.viewport.zoom(dir);
    }

    pub fn reset_viewport(&mut self) {
        self.viewport.reset();
    }

    /// Toggle between the limited and full timeline row set.
    pub fn toggle_all_rows(&mut self) {
        self.show_all_rows = !self.show_all_rows;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the enriched fleet snapshot to a JSON file.
    pub fn export_state(&self, path: &std::path::Path) -> Result<()> {
        use std::io::Write;

        if self.nodes.is_empty() {
            anyhow::bail!("No data to export");
        }

        let json = serde_json::to_string_pretty(&self.nodes)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}

/// Read a per-VSN summary file (JSON object of VSN → record list).
fn read_summary(path: &std::path::Path) -> Option<SummaryByVsn> {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "bad summary file");
                None
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable summary file");
            None
        }
    }
}

/// Group sanity-test records by VSN, the fallback timeline rows when no
/// pre-fetched sanity summary is configured.
fn sanity_from_records(records: &[MetricRecord]) -> SummaryByVsn {
    let mut by_vsn = SummaryByVsn::new();
    for record in records {
        if !record.name.starts_with("sys.sanity_status") {
            continue;
        }
        let Some(vsn) = &record.meta.vsn else {
            continue;
        };
        by_vsn.entry(vsn.clone()).or_default().push(record.clone());
    }
    by_vsn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Meta, MetricValue};
    use crate::source::ChannelSource;
    use chrono::{DateTime, Duration as ChronoDuration};

    fn app_with_channel() -> (tokio::sync::watch::Sender<Vec<MetricRecord>>, App) {
        let (tx, source) = ChannelSource::create("test");
        let app = App::new(Box::new(source), Settings::default()).with_inventory(vec![
            InventoryRow {
                id: "node-1".to_string(),
                vsn: "W001".to_string(),
                ..InventoryRow::default()
            },
            InventoryRow {
                id: "node-2".to_string(),
                vsn: "W002".to_string(),
                ..InventoryRow::default()
            },
        ]);
        (tx, app)
    }

    fn record(name: &str, value: f64, ts: DateTime<chrono::Utc>, node: &str, vsn: &str) -> MetricRecord {
        MetricRecord {
            timestamp: ts,
            name: name.to_string(),
            value: MetricValue::Number(value),
            end: None,
            meta: Meta {
                node: Some(node.to_string()),
                host: Some(format!("{}.ws-nxcore", node)),
                vsn: Some(vsn.to_string()),
                ..Meta::default()
            },
        }
    }

    #[test]
    fn test_refresh_replaces_snapshot_and_keeps_viewport() {
        let (tx, mut app) = app_with_channel();
        let now = chrono::Utc::now();

        app.viewport.drag(-40.0);
        let transform = app.viewport.transform;

        tx.send(vec![
            record("sys.uptime", 300.0, now - ChronoDuration::minutes(1), "node-1", "W001"),
            record("sys.sanity_status.wifi", 0.0, now, "node-1", "W001"),
        ])
        .unwrap();

        assert!(app.reload_data().unwrap());
        assert_eq!(app.nodes.len(), 2);
        assert_eq!(app.timeline_data.row_count(), 1);
        // data refresh never touches the viewport
        assert_eq!(app.viewport.transform, transform);
    }

    #[test]
    fn test_filter_narrows_selection_range() {
        let (tx, mut app) = app_with_channel();
        let now = chrono::Utc::now();
        tx.send(vec![record("sys.uptime", 1.0, now, "node-1", "W001")]).unwrap();
        let _ = app.reload_data();

        assert_eq!(app.filtered_node_count(), 2);
        app.filter_text = "w002".to_string();
        assert_eq!(app.filtered_node_count(), 1);
        assert_eq!(app.get_selected_node().unwrap().inventory.vsn, "W002");
    }

    #[test]
    fn test_select_vsn_in_sorted_order() {
        let (tx, mut app) = app_with_channel();
        let now = chrono::Utc::now();
        tx.send(vec![record("sys.uptime", 1.0, now, "node-1", "W001")]).unwrap();
        let _ = app.reload_data();

        assert!(app.select_vsn("W002"));
        assert_eq!(app.get_selected_node().unwrap().inventory.vsn, "W002");
        assert!(!app.select_vsn("W999"));
    }

    #[test]
    fn test_timeline_rows_fall_back_to_stream_sanity_records() {
        let records = vec![
            record("sys.sanity_status.wifi", 0.0, chrono::Utc::now(), "node-1", "W001"),
            record("sys.uptime", 300.0, chrono::Utc::now(), "node-1", "W001"),
        ];
        let by_vsn = sanity_from_records(&records);
        assert_eq!(by_vsn.len(), 1);
        assert_eq!(by_vsn["W001"].len(), 1);
    }

    #[test]
    fn test_go_back_closes_overlay_before_leaving_view() {
        let (tx, mut app) = app_with_channel();
        tx.send(vec![record("sys.uptime", 1.0, chrono::Utc::now(), "node-1", "W001")]).unwrap();
        let _ = app.reload_data();

        app.set_view(View::Timeline);
        app.select_first();
        app.enter_detail();
        assert!(app.show_detail_overlay);

        app.go_back();
        assert!(!app.show_detail_overlay);
        assert_eq!(app.current_view, View::Timeline);

        app.go_back();
        assert_eq!(app.current_view, View::Status);
    }
}
