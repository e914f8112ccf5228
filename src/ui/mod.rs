//! Terminal rendering with ratatui.
//!
//! One module per view plus the shared chrome ([`common`]) and the modal
//! overlays ([`detail`]).

pub mod cloudwatch;
pub mod common;
pub mod detail;
pub mod instances;
pub mod monitor;
pub mod plans;
pub mod statistics;
pub mod theme;

pub use theme::{Theme, Tone};

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::Frame;

use crate::app::{App, View};

/// Height of the control panel above the Monitor table.
pub const MONITOR_PANEL_HEIGHT: u16 = 4;
/// Height of the collection panel of the CloudWatch view.
pub const COLLECTION_PANEL_HEIGHT: u16 = 4;
/// Height of the progress log of the CloudWatch view.
pub const LOG_PANEL_HEIGHT: u16 = 8;
/// Height of the bar above the Statistics and Instances tables.
pub const SUMMARY_BAR_HEIGHT: u16 = 3;

/// Rows between the top of the content area and the first table row: the
/// panels above the table, its top border and its header.
pub fn first_row_offset(view: View) -> u16 {
    let table_chrome = 2;
    match view {
        View::Monitor => MONITOR_PANEL_HEIGHT + table_chrome,
        View::Plans => table_chrome,
        View::CloudWatch => COLLECTION_PANEL_HEIGHT + LOG_PANEL_HEIGHT + table_chrome,
        View::Statistics | View::Instances => SUMMARY_BAR_HEIGHT + table_chrome,
    }
}

/// Render the current view into `area`.
pub fn render_view(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_view {
        View::Monitor => monitor::render(frame, app, area),
        View::Plans => plans::render(frame, app, area),
        View::CloudWatch => cloudwatch::render(frame, app, area),
        View::Statistics => statistics::render(frame, app, area),
        View::Instances => instances::render(frame, app, area),
    }
}

/// Header, tabs, optional banner, content and status bar.
pub struct ScreenLayout {
    pub header: Rect,
    pub tabs: Rect,
    pub banner: Option<Rect>,
    pub content: Rect,
    pub status: Rect,
}

impl ScreenLayout {
    pub fn new(area: Rect, with_banner: bool) -> Self {
        let banner_height = if with_banner { 1 } else { 0 };
        let chunks = Layout::vertical([
            Constraint::Length(1),             // Header bar
            Constraint::Length(1),             // Tabs
            Constraint::Length(banner_height), // Error banner
            Constraint::Min(8),                // Content
            Constraint::Length(1),             // Status bar
        ])
        .split(area);

        Self {
            header: chunks[0],
            tabs: chunks[1],
            banner: with_banner.then_some(chunks[2]),
            content: chunks[3],
            status: chunks[4],
        }
    }
}

/// Draw the whole screen.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let layout = ScreenLayout::new(area, app.current_banner().is_some());

    common::render_header(frame, app, layout.header);
    common::render_tabs(frame, app, layout.tabs);
    if let Some(banner) = layout.banner {
        common::render_banner(frame, app, banner);
    }
    render_view(frame, app, layout.content);
    common::render_status_bar(frame, app, layout.status);

    if app.overlay.is_some() {
        detail::render_overlay(frame, app, area);
    }
    if app.show_help {
        common::render_help(frame, app, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_with_banner() {
        let area = Rect::new(0, 0, 80, 24);
        let plain = ScreenLayout::new(area, false);
        assert!(plain.banner.is_none());
        assert_eq!(plain.content.y, 2);

        let with_banner = ScreenLayout::new(area, true);
        assert_eq!(with_banner.banner.map(|b| b.y), Some(2));
        assert_eq!(with_banner.content.y, 3);
        assert_eq!(with_banner.status.y, 23);
    }

    #[test]
    fn test_first_row_offsets() {
        assert_eq!(first_row_offset(View::Plans), 2);
        assert_eq!(first_row_offset(View::Monitor), 6);
        assert_eq!(first_row_offset(View::CloudWatch), 14);
    }
}
