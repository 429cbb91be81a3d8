//! Terminal theme for the dashboard chrome.
//!
//! The timeline cells carry their own RGB palette (see
//! [`crate::timeline::Palette`]); this theme only styles the chrome around
//! them: tables, tabs, borders, and the status coloring of node rows.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::ReportStatus;

/// Chrome colors and styles, picked once at startup.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent for active elements and modal borders.
    pub highlight: Color,
    /// Elapsed times past the warn threshold, failing-check counts.
    pub warning: Color,
    /// Nodes that stopped reporting, failed checks.
    pub critical: Color,
    /// Reporting nodes, passing checks.
    pub healthy: Color,
    pub border: Color,
    pub header: Style,
    /// The selected table row.
    pub selected: Style,
    pub tab_active: Style,
    pub tab_inactive: Style,
    pub border_type: BorderType,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::LightRed,
            healthy: Color::Green,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Rgb(0xb0, 0x6a, 0x00),
            critical: Color::Red,
            healthy: Color::Rgb(0x1a, 0x7a, 0x1a),
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Plain,
        }
    }

    /// Pick dark or light from the terminal's background luminance; an
    /// undetectable background (pipes, odd terminals) falls back to dark.
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Row style for a node's reporting status. `None` means the node has
    /// never joined with telemetry and is dimmed rather than alarmed.
    pub fn status_style(&self, status: Option<ReportStatus>) -> Style {
        match status {
            Some(ReportStatus::Reporting) => Style::default().fg(self.healthy),
            Some(ReportStatus::NotReporting) => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
            None => Style::default().add_modifier(Modifier::DIM),
        }
    }
}
