use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, View};
use crate::timeline::{ClickTarget, PanDirection, Timeline, ZoomDirection};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    // If detail overlay is shown, handle overlay-specific keys
    if app.show_detail_overlay {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace | KeyCode::Char('q') => {
                app.close_overlay();
            }
            // Allow scrolling through nodes while overlay is open
            KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => app.select_next(),
            KeyCode::PageUp => app.select_prev_n(10),
            KeyCode::PageDown => app.select_next_n(10),
            KeyCode::Home => app.select_first(),
            KeyCode::End => app.select_last(),
            _ => {}
        }
        return;
    }

    // If filter input is active, handle text input
    if app.filter_active {
        handle_filter_input(app, key);
        return;
    }

    match key.code {
        // Quit
        KeyCode::Char('q') => app.quit(),

        // View switching
        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),
        KeyCode::Char('1') => app.set_view(View::Status),
        KeyCode::Char('2') => app.set_view(View::Timeline),

        // Timeline gestures; arrows pan instead of moving the selection
        KeyCode::Left if app.current_view == View::Timeline => app.pan(PanDirection::Left),
        KeyCode::Right if app.current_view == View::Timeline => app.pan(PanDirection::Right),
        KeyCode::Char('+') | KeyCode::Char('=') if app.current_view == View::Timeline => {
            app.zoom(ZoomDirection::In)
        }
        KeyCode::Char('-') if app.current_view == View::Timeline => app.zoom(ZoomDirection::Out),
        KeyCode::Char('0') if app.current_view == View::Timeline => app.reset_viewport(),
        KeyCode::Char('m') if app.current_view == View::Timeline => app.toggle_all_rows(),

        // Navigation
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        // Enter detail overlay
        KeyCode::Enter => app.enter_detail(),

        // Go back (Esc and Backspace)
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),

        // Reload
        KeyCode::Char('r') => {
            let _ = app.reload_data();
        }

        // Help
        KeyCode::Char('?') => app.toggle_help(),

        // Sorting (Status view)
        KeyCode::Char('s') if app.current_view == View::Status => app.cycle_sort(),
        KeyCode::Char('S') if app.current_view == View::Status => app.toggle_sort_direction(),

        // Filter (start typing to filter)
        KeyCode::Char('/') => app.start_filter(),

        // Clear filter
        KeyCode::Char('c') => {
            if !app.filter_text.is_empty() {
                app.clear_filter();
            }
        }

        // Export
        KeyCode::Char('e') => {
            let export_path = std::path::PathBuf::from("fleet_export.json");
            match app.export_state(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ => {}
    }
}

/// Handle key input while filter is active
fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        // Confirm filter
        KeyCode::Enter => {
            app.filter_active = false;
        }

        // Cancel filter (keep text but exit input mode)
        KeyCode::Esc => {
            app.cancel_filter();
        }

        // Clear and exit
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_filter();
        }

        // Backspace
        KeyCode::Backspace => {
            app.filter_pop();
            if app.filter_text.is_empty() {
                app.filter_active = false;
            }
        }

        // Type characters
        KeyCode::Char(c) => {
            app.filter_push(c);
        }

        _ => {}
    }
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        // Scroll wheel: zoom on the timeline, move the selection elsewhere
        MouseEventKind::ScrollUp => {
            if app.current_view == View::Timeline {
                app.zoom(ZoomDirection::In);
            } else {
                app.select_prev();
            }
        }
        MouseEventKind::ScrollDown => {
            if app.current_view == View::Timeline {
                app.zoom(ZoomDirection::Out);
            } else {
                app.select_next();
            }
        }

        // Hover tracking for the timeline tooltip
        MouseEventKind::Moved => {
            app.hover = Some((mouse.column, mouse.row));
            app.drag_origin = None;
        }

        // Continuous drag pan on the timeline
        MouseEventKind::Drag(MouseButton::Left) => {
            if app.current_view == View::Timeline {
                if let Some((ox, _)) = app.drag_origin {
                    let dx = mouse.column as f64 - ox as f64;
                    app.viewport.drag(dx);
                }
                app.drag_origin = Some((mouse.column, mouse.row));
            }
        }

        MouseEventKind::Up(MouseButton::Left) => {
            app.drag_origin = None;
        }

        // Click to select
        MouseEventKind::Down(MouseButton::Left) => {
            app.drag_origin = Some((mouse.column, mouse.row));

            match app.current_view {
                View::Status => {
                    // Calculate which row was clicked (accounting for header/tabs)
                    let clicked_row = mouse.row;
                    if clicked_row > content_start_row {
                        let item_row = (clicked_row - content_start_row - 1) as usize;
                        if item_row < app.filtered_node_count() {
                            app.selected_node_index = item_row;
                        }
                    }
                }
                View::Timeline => {
                    handle_timeline_click(app, mouse.column, mouse.row);
                }
            }

            // Check for tab clicks (row 1, after header)
            if mouse.row == 1 {
                let col = mouse.column;
                // Approximate tab positions: Status (0-11), Timeline (12-24)
                if col < 12 {
                    app.set_view(View::Status);
                } else if col < 25 {
                    app.set_view(View::Timeline);
                }
            }
        }

        // Right-click goes back
        MouseEventKind::Down(MouseButton::Right) => {
            app.go_back();
        }

        _ => {}
    }
}

/// Resolve a timeline click through hit-testing and open the matching
/// node's detail.
fn handle_timeline_click(app: &mut App, col: u16, row: u16) {
    let Some(area) = app.timeline_area else {
        return;
    };

    let timeline = Timeline::new(&app.timeline_data, &app.timeline_config);
    let vsn = match timeline.click_target(area, &app.viewport, app.show_all_rows, col, row) {
        Some(ClickTarget::Cell(cell)) => Some(cell.row.clone()),
        Some(ClickTarget::Row(label, _)) => Some(label.to_string()),
        None => None,
    };

    if let Some(vsn) = vsn {
        if app.select_vsn(&vsn) {
            app.show_detail_overlay = true;
        }
    }
}
