//! Timeline view rendering.
//!
//! Hosts the timeline matrix widget: draws the chart, the row-reveal
//! affordance, and the hover tooltip, and records the drawn area so mouse
//! events can be hit-tested against the same geometry.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, View};
use crate::timeline::Timeline;

/// Render the Timeline view with the sanity matrix.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .title(" Sanity Timeline [←→:pan +/-:zoom 0:reset m:rows] ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let timeline = Timeline::new(&app.timeline_data, &app.timeline_config);
    let hidden = timeline.hidden_row_count(app.show_all_rows);
    let limited = app.timeline_config.row_limit.is_some()
        && app.timeline_config.row_limit.unwrap_or(0) < app.timeline_data.row_count();

    // Reserve the last line for the reveal affordance when rows are limited
    let (chart_area, footer_area) = if limited && inner.height > 1 {
        (
            Rect::new(inner.x, inner.y, inner.width, inner.height - 1),
            Some(Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1)),
        )
    } else {
        (inner, None)
    };

    timeline.render(frame, chart_area, &mut app.viewport, app.show_all_rows);
    app.timeline_area = Some(chart_area);

    if let Some(footer) = footer_area {
        let text = if hidden > 0 {
            format!("▼ show {} more rows (m)", hidden)
        } else {
            "▲ collapse rows (m)".to_string()
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().add_modifier(Modifier::DIM)),
            footer,
        );
    }

    // Hover tooltip, hidden as soon as the pointer leaves a cell
    if app.current_view == View::Timeline && !app.show_detail_overlay {
        if let Some((col, row)) = app.hover {
            let screen = frame.area();
            if let Some(cell) =
                timeline.hit_test(chart_area, &app.viewport, app.show_all_rows, col, row)
            {
                timeline.render_tooltip(frame, screen, cell, (col, row), None);
            }
        }
    }
}
