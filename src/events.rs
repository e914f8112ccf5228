use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, InputMode, Overlay, View};
use crate::ui;

/// File written by the export key.
pub const EXPORT_FILE: &str = "slowquery_export.json";

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
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        if app.input_mode == InputMode::Filter {
            app.clear_filter();
        } else {
            app.quit();
        }
        return;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.overlay.is_some() {
        handle_overlay_key(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => {}
        InputMode::Filter => {
            handle_filter_input(app, key);
            return;
        }
        InputMode::Pid | InputMode::Date => {
            handle_field_input(app, key);
            return;
        }
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

        // Direct view access
        KeyCode::Char('1') => app.push_view(View::Monitor),
        KeyCode::Char('2') => app.push_view(View::Plans),
        KeyCode::Char('3') => app.push_view(View::CloudWatch),
        KeyCode::Char('4') => app.push_view(View::Statistics),
        KeyCode::Char('5') => app.push_view(View::Instances),

        // Navigation (up/down for items, left/right for tabs)
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Left | KeyCode::Char('h') => app.prev_view(),
        KeyCode::Right | KeyCode::Char('l') => app.next_view(),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        // Pages
        KeyCode::Char(']') => app.page_next(),
        KeyCode::Char('[') => app.page_prev(),
        KeyCode::Char('{') => app.page_first(),
        KeyCode::Char('}') => app.page_last(),

        // Detail overlay
        KeyCode::Enter => app.enter_detail(),

        // Clear a leftover filter before navigating back
        KeyCode::Esc if !app.filter_text.is_empty() => app.clear_filter(),
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),

        KeyCode::Char('r') => app.reload(),
        KeyCode::Char('?') => app.toggle_help(),
        KeyCode::Char('/') => app.start_filter(),
        KeyCode::Char('y') => app.copy_sql(),

        // Export
        KeyCode::Char('e') => {
            let export_path = std::path::PathBuf::from(EXPORT_FILE);
            match app.export_state(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ => handle_view_key(app, key),
    }
}

/// Keys that only mean something in one view.
fn handle_view_key(app: &mut App, key: KeyEvent) {
    let KeyCode::Char(c) = key.code else {
        return;
    };

    match (app.current_view, c) {
        (View::Monitor, 's') => app.start_monitor(),
        (View::Monitor, 'x') => app.stop_monitor(),
        (View::Monitor, 'p') => app.start_pid_input(),
        (View::Monitor, 'c') => app.collect_explain(),
        (View::Monitor, 'v') => app.view_explain(),
        (View::Monitor, 'm') => app.download_markdown(),
        (View::Monitor | View::Plans, 'i') => app.open_instance_filter(),

        (View::CloudWatch, 'd') => app.start_date_input(),
        (View::CloudWatch, 'c') => app.start_collection(),
        (View::CloudWatch, 't') => app.check_collection_status(),
        (View::CloudWatch, 'w') => app.stop_watch(),

        (View::Statistics, 'f') => app.cycle_stats_panel(),
        (View::Statistics, 'i') => app.open_instance_filter(),
        (View::Statistics, 'g') => app.open_metric_picker(),
        (View::Statistics, 'm') => app.open_month_picker(),
        (View::Statistics, 'n') => app.cycle_month(),
        (View::Statistics, 'v') => app.toggle_compare(),
        (View::Statistics, 'C') => app.calculate_statistics(),

        (View::Instances, 'c') => app.collect_rds_instances(),

        _ => {}
    }
}

/// Keys while an overlay is open
fn handle_overlay_key(app: &mut App, key: KeyEvent) {
    let is_picker = matches!(app.overlay, Some(Overlay::Picker(_)));

    match key.code {
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => app.close_overlay(),
        KeyCode::Enter if is_picker => app.picker_select(),
        KeyCode::Enter => app.close_overlay(),
        KeyCode::Char(' ') if is_picker => app.picker_toggle(),
        KeyCode::Char('a') if is_picker => app.picker_toggle_all(),
        KeyCode::Char('y') if !is_picker => app.copy_sql(),
        KeyCode::Up | KeyCode::Char('k') => scroll_overlay(app, false, 1),
        KeyCode::Down | KeyCode::Char('j') => scroll_overlay(app, true, 1),
        KeyCode::PageUp => scroll_overlay(app, false, 10),
        KeyCode::PageDown => scroll_overlay(app, true, 10),
        _ => {}
    }
}

fn scroll_overlay(app: &mut App, down: bool, n: u16) {
    if let Some(overlay) = app.overlay.as_mut() {
        if down {
            overlay.scroll_down(n);
        } else {
            overlay.scroll_up(n);
        }
    }
}

/// Handle key input while filter is active
fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        // Confirm or cancel (keep text but exit input mode)
        KeyCode::Enter | KeyCode::Esc => app.cancel_filter(),

        // Backspace
        KeyCode::Backspace => {
            app.filter_pop();
            if app.filter_text.is_empty() {
                app.cancel_filter();
            }
        }

        // Type characters
        KeyCode::Char(c) => app.filter_push(c),

        _ => {}
    }
}

/// Handle key input of the PID and date fields
fn handle_field_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.input_confirm(),
        KeyCode::Esc => app.input_cancel(),
        KeyCode::Backspace => app.input_pop(),
        KeyCode::Char(c) => app.input_push(c),
        _ => {}
    }
}

/// Tab under `column` of the tab bar.
///
/// Each tab is its label padded by one space on both sides, and tabs are
/// separated by a one-column divider.
pub fn tab_at(column: u16) -> Option<View> {
    let mut start = 0u16;
    for view in View::ALL {
        let width = view.label().len() as u16 + 2;
        if column < start + width {
            return Some(view);
        }
        start += width + 1;
        if column < start {
            return None;
        }
    }
    None
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        // Scroll wheel
        MouseEventKind::ScrollUp => match app.overlay.as_mut() {
            Some(overlay) => overlay.scroll_up(1),
            None => app.select_prev(),
        },
        MouseEventKind::ScrollDown => match app.overlay.as_mut() {
            Some(overlay) => overlay.scroll_down(1),
            None => app.select_next(),
        },

        // Click to select
        MouseEventKind::Down(MouseButton::Left) => {
            if app.overlay.is_some() || app.show_help {
                return;
            }

            // Tab bar is the row after the header
            if mouse.row == 1 {
                if let Some(view) = tab_at(mouse.column) {
                    app.push_view(view);
                }
                return;
            }

            let first_row = content_start_row + ui::first_row_offset(app.current_view);
            if mouse.row >= first_row {
                app.select_row((mouse.row - first_row) as usize);
            }
        }

        // Right-click goes back
        MouseEventKind::Down(MouseButton::Right) => app.go_back(),

        _ => {}
    }
}
