//! Timeline matrix rendering and hit-testing.
//!
//! Draws a row×time cell matrix into a ratatui frame: y-axis row labels on
//! the left, a time axis on top, and one colored band per row. Scales are
//! recomputed from the current data and viewport on every render, so a
//! redraw is an idempotent rebind; pan/zoom state lives in
//! [`ViewportState`] and survives data refreshes untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use serde::{Deserialize, Serialize};

use crate::data::record::{Meta, MetricRecord, MetricSample, MetricValue, Severity};

use super::scale::{
    cell_color, cell_width, time_domain, BandScale, CellUnit, ColorScale, Palette, TimeScale,
};
use super::viewport::ViewportState;

/// Tooltip placement relative to the pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TooltipPos {
    Top,
    #[default]
    Bottom,
}

/// One flattened cell: a row label plus the sample it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineCell {
    pub row: String,
    pub timestamp: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub value: Option<MetricValue>,
    pub meta: Meta,
}

/// Flattened timeline data: ordered row labels and their cells.
///
/// Construction from keyed mappings is the only way in; callers cannot hand
/// the chart an unkeyed shape.
#[derive(Debug, Clone, Default)]
pub struct TimelineData {
    rows: Vec<String>,
    cells: Vec<TimelineCell>,
}

impl TimelineData {
    /// Flatten grouped samples (`row label → samples`) into cells.
    pub fn from_grouped(data: &BTreeMap<String, Vec<MetricSample>>) -> Self {
        let mut out = Self::default();
        for (row, samples) in data {
            out.rows.push(row.clone());
            for s in samples {
                out.cells.push(TimelineCell {
                    row: row.clone(),
                    timestamp: s.timestamp,
                    end: s.end,
                    value: Some(s.value.clone()),
                    meta: s.meta.clone(),
                });
            }
        }
        out
    }

    /// Flatten a per-key record summary (e.g. sanity results keyed by VSN).
    pub fn from_summary(data: &BTreeMap<String, Vec<MetricRecord>>) -> Self {
        let mut out = Self::default();
        for (row, records) in data {
            out.rows.push(row.clone());
            for r in records {
                out.cells.push(TimelineCell {
                    row: row.clone(),
                    timestamp: r.timestamp,
                    end: r.end,
                    value: Some(r.value.clone()),
                    meta: r.meta.clone(),
                });
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn cells(&self) -> &[TimelineCell] {
        &self.cells
    }

    /// All cells belonging to one row, in flattening order.
    pub fn row_cells(&self, label: &str) -> Vec<&TimelineCell> {
        self.cells.iter().filter(|c| c.row == label).collect()
    }
}

/// Rendering configuration, owned by the caller and passed per render.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    pub cell_unit: CellUnit,
    /// Domain overrides; when set they win over the data extent.
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub tooltip_pos: TooltipPos,
    /// Draw only the first N rows until the caller reveals the rest.
    pub row_limit: Option<usize>,
    pub palette: Palette,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            cell_unit: CellUnit::Hour,
            start_time: None,
            end_time: None,
            tooltip_pos: TooltipPos::default(),
            row_limit: None,
            palette: Palette::default(),
        }
    }
}

/// What a click landed on. The host matches on this to drive navigation;
/// hit-testing is the engine's only channel back to the host.
#[derive(Debug)]
pub enum ClickTarget<'a> {
    Cell(&'a TimelineCell),
    Row(&'a str, Vec<&'a TimelineCell>),
}

/// Geometry of one rendered frame: label gutter, axis row, and plot area.
#[derive(Debug, Clone, Copy)]
struct ChartGeometry {
    label_width: u16,
    axis: Rect,
    plot: Rect,
}

const MAX_LABEL_WIDTH: u16 = 20;
const MIN_LABEL_WIDTH: u16 = 6;

/// The timeline matrix widget. Borrow of data and config; all mutation
/// happens through the viewport the host owns.
pub struct Timeline<'a> {
    pub data: &'a TimelineData,
    pub config: &'a TimelineConfig,
}

impl<'a> Timeline<'a> {
    pub fn new(data: &'a TimelineData, config: &'a TimelineConfig) -> Self {
        Self { data, config }
    }

    /// Row labels currently drawn, honoring the row limit.
    pub fn visible_rows(&self, show_all: bool) -> &[String] {
        match self.config.row_limit {
            Some(limit) if !show_all && self.data.rows.len() > limit => &self.data.rows[..limit],
            _ => &self.data.rows,
        }
    }

    /// Rows hidden behind the reveal affordance.
    pub fn hidden_row_count(&self, show_all: bool) -> usize {
        self.data.rows.len() - self.visible_rows(show_all).len()
    }

    fn geometry(&self, area: Rect) -> ChartGeometry {
        // character count, not byte length: labels may be non-ASCII
        let longest =
            self.data.rows.iter().map(|r| r.chars().count() as u16).max().unwrap_or(0);
        let label_width = (longest + 1).clamp(MIN_LABEL_WIDTH, MAX_LABEL_WIDTH).min(area.width / 2);

        let axis = Rect::new(area.x + label_width, area.y, area.width - label_width, 1);
        let plot = Rect::new(
            area.x + label_width,
            area.y + 1,
            area.width - label_width,
            area.height.saturating_sub(1),
        );
        ChartGeometry { label_width, axis, plot }
    }

    /// The x-scale for this frame: base scale over the domain, rescaled
    /// through the current zoom transform.
    fn x_scale(&self, plot: Rect, viewport: &ViewportState) -> Option<TimeScale> {
        let domain = time_domain(
            &self.data.cells,
            self.config.cell_unit,
            self.config.start_time,
            self.config.end_time,
        )?;
        let base = TimeScale::new(domain, (0.0, plot.width as f64));
        Some(viewport.transform.rescale(&base))
    }

    /// Draw the matrix. Updates `viewport.pixel_width` to the plot width so
    /// gesture math matches what is on screen.
    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        viewport: &mut ViewportState,
        show_all: bool,
    ) {
        if self.data.is_empty() || area.width < MIN_LABEL_WIDTH + 4 || area.height < 2 {
            let msg = Paragraph::new("no timeline data")
                .style(Style::default().add_modifier(Modifier::DIM));
            frame.render_widget(msg, area);
            return;
        }

        let geo = self.geometry(area);
        viewport.pixel_width = geo.plot.width as f64;

        let Some(xs) = self.x_scale(geo.plot, viewport) else {
            return;
        };

        // Color stops come from the full dataset, not the visible slice, so
        // colors stay stable while panning.
        let colors = ColorScale::from_cells(&self.data.cells, &self.config.palette);

        let rows = self.visible_rows(show_all);
        let bands = BandScale::new(rows.to_vec(), (0.0, rows.len() as f64));

        self.render_axis(frame, geo.axis, &xs);
        self.render_labels(frame, area, &geo, rows);
        self.render_cells(frame, &geo, &xs, &bands, &colors);
    }

    fn render_axis(&self, frame: &mut Frame, axis: Rect, xs: &TimeScale) {
        // A tick roughly every 18 columns, labels clipped to the axis row.
        let mut spans: Vec<Span> = Vec::new();
        let tick_every = 18u16;
        let mut col = 0u16;
        while col < axis.width {
            let t = xs.invert(col as f64);
            let label = t.format("%m/%d %H:%M").to_string();
            let label_len = label.len() as u16;
            spans.push(Span::styled(label, Style::default().add_modifier(Modifier::DIM)));
            if col + tick_every <= axis.width && tick_every > label_len {
                spans.push(Span::raw(" ".repeat((tick_every - label_len) as usize)));
            }
            col += tick_every;
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), axis);
    }

    fn render_labels(&self, frame: &mut Frame, area: Rect, geo: &ChartGeometry, rows: &[String]) {
        for (i, label) in rows.iter().enumerate() {
            let y = geo.plot.y + i as u16;
            if y >= area.y + area.height {
                break;
            }
            let label_area = Rect::new(area.x, y, geo.label_width, 1);
            // truncate by characters; byte slicing would panic mid-codepoint
            let text: String = label.chars().take(geo.label_width as usize).collect();
            frame.render_widget(
                Paragraph::new(text).style(Style::default().add_modifier(Modifier::BOLD)),
                label_area,
            );
        }
    }

    fn render_cells(
        &self,
        frame: &mut Frame,
        geo: &ChartGeometry,
        xs: &TimeScale,
        bands: &BandScale,
        colors: &ColorScale,
    ) {
        let buf = frame.buffer_mut();
        let plot = geo.plot;

        for cell in &self.data.cells {
            let Some(band_y) = bands.position(&cell.row) else {
                continue; // row hidden by the limit
            };
            let y = plot.y + band_y as u16;
            if y >= plot.y + plot.height {
                continue;
            }

            let x0 = xs.scale(cell.timestamp);
            let w = cell_width(cell, xs, self.config.cell_unit);
            let x1 = x0 + w;
            if x1 <= 0.0 || x0 >= plot.width as f64 {
                continue; // outside the visible window
            }

            let start = plot.x + x0.max(0.0) as u16;
            let end = plot.x + (x1.min(plot.width as f64).ceil() as u16).max(x0.max(0.0) as u16 + 1);
            let end = end.min(plot.x + plot.width);

            let rgb = cell_color(cell, colors, &self.config.palette);
            let color = Color::Rgb(rgb.0, rgb.1, rgb.2);
            for x in start..end {
                if let Some(c) = buf.cell_mut((x, y)) {
                    c.set_symbol(" ");
                    c.set_bg(color);
                }
            }
        }
    }

    /// The cell under a terminal position, or `None` over gaps, labels, or
    /// the axis. `area` must be the rect the last render used.
    pub fn hit_test(
        &self,
        area: Rect,
        viewport: &ViewportState,
        show_all: bool,
        col: u16,
        row: u16,
    ) -> Option<&TimelineCell> {
        if self.data.is_empty() {
            return None;
        }
        let geo = self.geometry(area);
        let plot = geo.plot;
        if col < plot.x || col >= plot.x + plot.width || row < plot.y || row >= plot.y + plot.height
        {
            return None;
        }

        let xs = self.x_scale(plot, viewport)?;
        let rows = self.visible_rows(show_all);
        let bands = BandScale::new(rows.to_vec(), (0.0, rows.len() as f64));
        let label = bands.label_at((row - plot.y) as f64)?;

        let px = (col - plot.x) as f64;
        // Last match wins, mirroring paint order: later cells draw on top.
        self.data
            .cells
            .iter()
            .filter(|c| c.row == label)
            .filter(|c| {
                let x0 = xs.scale(c.timestamp);
                let x1 = x0 + cell_width(c, &xs, self.config.cell_unit);
                px >= x0 && px < x1.max(x0 + 1.0)
            })
            .last()
    }

    /// Resolve a click to its target: a cell in the plot, or a row label
    /// in the gutter (delivered with the row's full cell list).
    pub fn click_target(
        &self,
        area: Rect,
        viewport: &ViewportState,
        show_all: bool,
        col: u16,
        row: u16,
    ) -> Option<ClickTarget<'_>> {
        if let Some(cell) = self.hit_test(area, viewport, show_all, col, row) {
            return Some(ClickTarget::Cell(cell));
        }
        let label = self.row_label_at(area, show_all, col, row)?;
        Some(ClickTarget::Row(label, self.data.row_cells(label)))
    }

    /// The row label under a terminal position in the label gutter.
    pub fn row_label_at(&self, area: Rect, show_all: bool, col: u16, row: u16) -> Option<&str> {
        if self.data.is_empty() {
            return None;
        }
        let geo = self.geometry(area);
        if col < area.x || col >= area.x + geo.label_width {
            return None;
        }
        if row < geo.plot.y || row >= geo.plot.y + geo.plot.height {
            return None;
        }
        let rows = self.visible_rows(show_all);
        let bands = BandScale::new(rows.to_vec(), (0.0, rows.len() as f64));
        let label = bands.label_at((row - geo.plot.y) as f64)?;
        self.data.rows.iter().find(|r| r.as_str() == label).map(String::as_str)
    }

    /// Render the hover tooltip near the pointer, above or below per the
    /// configured placement.
    pub fn render_tooltip(
        &self,
        frame: &mut Frame,
        screen: Rect,
        cell: &TimelineCell,
        pointer: (u16, u16),
        formatter: Option<&dyn Fn(&TimelineCell) -> String>,
    ) {
        let text = match formatter {
            Some(f) => f(cell),
            None => default_tooltip(cell),
        };
        let lines: Vec<&str> = text.lines().collect();
        let width = (lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u16 + 4)
            .min(screen.width);
        let height = (lines.len() as u16 + 2).min(screen.height);

        let (px, py) = pointer;
        let y = match self.config.tooltip_pos {
            TooltipPos::Bottom => (py + 1).min(screen.height.saturating_sub(height)),
            TooltipPos::Top => py.saturating_sub(height),
        };
        let x = px.min(screen.width.saturating_sub(width));
        let tip_area = Rect::new(x, y, width, height);

        let block = Block::default().borders(Borders::ALL);
        let body: Vec<Line> = lines.into_iter().map(|l| Line::from(l.to_string())).collect();
        frame.render_widget(Clear, tip_area);
        frame.render_widget(Paragraph::new(body).block(block), tip_area);
    }
}

/// Default tooltip copy: date/time, pass-fail wording, raw value.
pub fn default_tooltip(cell: &TimelineCell) -> String {
    let status = match cell.value.as_ref().and_then(MetricValue::as_f64) {
        Some(v) if v == 0.0 => "passed",
        Some(v) if v > 0.0 && cell.meta.severity == Some(Severity::Warning) => "warning",
        Some(_) => "failed",
        None => "no value",
    };
    let value = cell.value.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    format!(
        "{}\n{}\nvalue: {}",
        cell.timestamp.format("%a %b %d %Y %H:%M:%S"),
        status,
        value
    )
}
