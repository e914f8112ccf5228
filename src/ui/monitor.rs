//! Monitor view rendering.
//!
//! The scraper controls and EXPLAIN capture panel on top, the live slow
//! query table below.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use super::common::{empty_message, filter_info, page_bar};
use super::MONITOR_PANEL_HEIGHT;
use crate::app::{App, InputMode};
use crate::data::format::{local_time, seconds};
use crate::data::sql::one_line;
use crate::source::Slot;

/// Render the Monitor view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(MONITOR_PANEL_HEIGHT),
        Constraint::Min(4),
    ])
    .split(area);

    render_controls(frame, app, chunks[0]);
    render_queries(frame, app, chunks[1]);
}

/// Action hint, dimmed when the action is unavailable.
fn action(label: &str, enabled: bool) -> Span<'static> {
    let style = if enabled {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    Span::styled(format!("[{}] ", label), style)
}

fn render_controls(frame: &mut Frame, app: &App, area: Rect) {
    let monitor = &app.monitor;

    let status = match &monitor.status {
        Some(s) if s.is_running() => Span::styled("● running  ", Style::default().fg(app.theme.healthy)),
        Some(s) => Span::styled(
            format!("○ {}  ", s.status),
            Style::default().add_modifier(Modifier::DIM),
        ),
        None => Span::styled("? unknown  ", Style::default().add_modifier(Modifier::DIM)),
    };

    let mut first = vec![Span::raw(" Scraper: "), status];
    first.push(action("s:start", app.can_start_monitor()));
    first.push(action("x:stop", app.can_stop_monitor()));
    if let Some(s) = monitor.status.as_ref().filter(|s| !s.message.is_empty()) {
        first.push(Span::styled(
            s.message.clone(),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    let editing = app.input_mode == InputMode::Pid;
    let pid_text = if editing {
        format!("{}_", monitor.pid_input)
    } else if monitor.pid_input.is_empty() {
        "-".to_string()
    } else {
        monitor.pid_input.clone()
    };
    let pid_style = if editing {
        Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let has_pid = monitor.pid().is_some();
    let mut second = vec![
        Span::raw(" PID: "),
        Span::styled(format!("{:<12}", pid_text), pid_style),
        action("c:collect", has_pid && !app.is_loading(Slot::CollectExplain)),
        action("v:view", has_pid),
        action("m:markdown", has_pid && !app.is_loading(Slot::Markdown)),
    ];
    if monitor.confirmation_visible() {
        if let Some(explain) = &monitor.explain {
            second.push(Span::styled(
                format!(
                    "✔ Explain saved for PID {} on {}",
                    explain.pid, explain.instance_name
                ),
                Style::default().fg(app.theme.healthy),
            ));
        }
    }

    let block = app.theme.block(" Slow query monitor ");
    let paragraph = Paragraph::new(vec![Line::from(first), Line::from(second)]).block(block);
    frame.render_widget(paragraph, area);
}

fn render_queries(frame: &mut Frame, app: &App, area: Rect) {
    let monitor = &app.monitor;
    let queries = app.visible_queries();

    let instance = monitor
        .instance_filter
        .as_deref()
        .unwrap_or("all instances");
    let title = format!(
        " Slow queries ({}) [i:{}]{} ",
        queries.len(),
        instance,
        filter_info(app)
    );
    let block = app.theme.block(title).title_bottom(page_bar(&monitor.pager));

    if queries.is_empty() {
        let message = empty_message(app, Slot::SlowQueries, monitor.loaded, "slow queries");
        let paragraph = Paragraph::new(format!(" {}", message))
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("PID"),
        Cell::from("Instance"),
        Cell::from("DB"),
        Cell::from("User"),
        Cell::from("Host"),
        Cell::from("Time"),
        Cell::from("Start"),
        Cell::from("SQL"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = queries
        .iter()
        .map(|q| {
            Row::new(vec![
                Cell::from(q.pid.to_string()),
                Cell::from(q.instance.clone()),
                Cell::from(q.db.clone()),
                Cell::from(q.user.clone()),
                Cell::from(q.host.clone()),
                Cell::from(seconds(q.time)).style(Style::default().fg(app.theme.warning)),
                Cell::from(local_time(&q.start)),
                Cell::from(one_line(&q.sql_text)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(8),  // PID
        Constraint::Fill(2),    // Instance
        Constraint::Fill(1),    // DB
        Constraint::Fill(1),    // User
        Constraint::Fill(1),    // Host
        Constraint::Length(9),  // Time
        Constraint::Length(19), // Start
        Constraint::Fill(4),    // SQL
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(monitor.selected.min(queries.len().saturating_sub(1))));

    frame.render_stateful_widget(table, area, &mut state);
}
