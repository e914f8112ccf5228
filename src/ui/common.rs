//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, error banner, status bar,
//! and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, InputMode, View};
use crate::data::format::thousands;
use crate::data::Pager;
use crate::source::Slot;

/// Render the header bar with AWS identity and scraper state.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        " SLOWQUERY CONSOLE ",
        Style::default().add_modifier(Modifier::BOLD),
    )];

    spans.push(Span::raw("│ "));
    match &app.aws {
        Some(aws) => {
            spans.push(Span::raw("Account "));
            spans.push(Span::styled(
                aws.account.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(format!(" ({}) ", aws.region)));
        }
        None if app.is_loading(Slot::AwsInfo) => spans.push(Span::raw("Loading... ")),
        None => spans.push(Span::styled(
            "AWS info unavailable ",
            Style::default().add_modifier(Modifier::DIM),
        )),
    }

    spans.push(Span::raw("│ Monitor "));
    let (icon, label, style) = match &app.monitor.status {
        Some(status) if status.is_running() => {
            ("●", "running", Style::default().fg(app.theme.healthy))
        }
        Some(status) => (
            "○",
            status.status.as_str(),
            Style::default().add_modifier(Modifier::DIM),
        ),
        None => ("?", "unknown", Style::default().add_modifier(Modifier::DIM)),
    };
    spans.push(Span::styled(format!("{} {}", icon, label), style));

    if let Some(err) = &app.source_error {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            err.clone(),
            Style::default().fg(app.theme.critical),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = View::ALL.iter().map(|v| Line::from(v.label())).collect();

    let tabs = Tabs::new(titles)
        .select(app.current_view.index())
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the most recent error banner.
pub fn render_banner(frame: &mut Frame, app: &App, area: Rect) {
    let Some((message, others)) = app.current_banner() else {
        return;
    };

    let more = if others > 0 {
        format!(" (+{} more)", others)
    } else {
        String::new()
    };
    let text = format!(" ✖ {}{} [Esc:dismiss]", message, more);
    frame.render_widget(Paragraph::new(text).style(app.theme.banner), area);
}

/// Render the status bar at the bottom.
///
/// Shows: breadcrumb trail, loading indicator, available controls.
/// Also displays temporary status messages and the active input field.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    // Check for temporary status message first
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = match app.input_mode {
        InputMode::Filter => "Type to search | Enter:apply Esc:cancel",
        InputMode::Pid => "Type a PID | Enter:apply Esc:cancel",
        InputMode::Date => "Type YYYY-MM-DD | Enter:apply Esc:cancel",
        InputMode::Normal => match app.current_view {
            View::Monitor => "s:start x:stop p:pid c:collect v:view m:md i:instance ?:help q:quit",
            View::Plans => "Enter:plan i:instance [/]:page y:copy ?:help q:quit",
            View::CloudWatch => "d:date c:collect t:status w:unwatch [/]:page ?:help q:quit",
            View::Statistics => "f:panel i:instances g:metrics m:month v:compare C:calc ?:help",
            View::Instances => "c:collect /:search r:reload ?:help q:quit",
        },
    };

    let loading = if app.is_loading(current_slot(app.current_view)) {
        " | Loading..."
    } else {
        ""
    };

    let rows = app.row_count();
    let position = if rows > 0 {
        format!(" | {}/{}", app.selected_index().min(rows - 1) + 1, rows)
    } else {
        String::new()
    };

    let status = format!(
        " {}{} | {}{} | {}",
        app.breadcrumb(),
        position,
        app.source_description(),
        loading,
        controls
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// The request that fills the main table of a view.
fn current_slot(view: View) -> Slot {
    match view {
        View::Monitor => Slot::SlowQueries,
        View::Plans => Slot::Plans,
        View::CloudWatch => Slot::Digest,
        View::Statistics => Slot::Statistics,
        View::Instances => Slot::RdsInstances,
    }
}

/// Title suffix showing the text filter, e.g. ` /orders_`.
pub fn filter_info(app: &App) -> String {
    if app.filter_active() {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [Esc:clear]", app.filter_text)
    } else {
        String::new()
    }
}

/// Message shown in place of an empty table.
pub fn empty_message(app: &App, slot: Slot, loaded: bool, what: &str) -> String {
    if app.is_loading(slot) && !loaded {
        "Loading...".to_string()
    } else if !app.filter_text.is_empty() {
        format!("No {} match the filter", what)
    } else {
        format!("No {}", what)
    }
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Navigation"),
        Line::from("  1-5 ←/→      Switch views"),
        Line::from("  ↑/↓ j/k      Navigate list"),
        Line::from("  PgUp/PgDn    Jump 10 items"),
        Line::from("  [ ] { }      Prev/next/first/last page"),
        Line::from("  Enter        SQL or plan detail"),
        Line::from("  Esc          Close, dismiss, go back"),
        Line::from(""),
        section(" Monitor"),
        Line::from("  s / x        Start / stop monitoring"),
        Line::from("  p            Enter PID"),
        Line::from("  c v m        Collect, view, download explain"),
        Line::from("  i            Filter by instance"),
        Line::from(""),
        section(" CloudWatch"),
        Line::from("  d            Target date"),
        Line::from("  c / t / w    Collect, status, stop watching"),
        Line::from(""),
        section(" Statistics"),
        Line::from("  f i g        Panel, instances, metrics"),
        Line::from("  m n v C      Month, next month, compare, calc"),
        Line::from(""),
        section(" General"),
        Line::from("  /            Search    y  Copy SQL"),
        Line::from("  r            Reload    e  Export JSON"),
        Line::from("  q            Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let help_height = (help_text.len() as u16 + 2).min(area.height.saturating_sub(2));
    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 48u16.min(area.width.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    // Clear the area behind the help
    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}

/// Page buttons for a table's bottom border, e.g. ` « 1 [2] 3 » 21-40 of 95 `.
pub fn page_bar(pager: &Pager) -> String {
    let pages: Vec<String> = pager
        .window()
        .into_iter()
        .map(|p| {
            if p == pager.page() {
                format!("[{}]", p)
            } else {
                p.to_string()
            }
        })
        .collect();
    let (first, last) = pager.item_range();
    format!(
        " « {} » {}-{} of {} ",
        pages.join(" "),
        first,
        last,
        thousands(pager.total())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bar() {
        let mut pager = Pager::new(20);
        pager.set_total(95);
        pager.next();
        assert_eq!(page_bar(&pager), " « 1 [2] 3 4 5 » 21-40 of 95 ");
    }

    #[test]
    fn test_current_slot_per_view() {
        assert_eq!(current_slot(View::Plans), Slot::Plans);
        assert_eq!(current_slot(View::Instances), Slot::RdsInstances);
    }
}
