//! CloudWatch view rendering.
//!
//! Collection controls, the live progress log of the running job and the
//! digest statistics of the collected slow logs.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use super::common::{empty_message, filter_info, page_bar};
use super::theme::Tone;
use super::{COLLECTION_PANEL_HEIGHT, LOG_PANEL_HEIGHT};
use crate::app::{App, InputMode, StreamState};
use crate::data::format::{number, seconds, thousands};
use crate::data::sql::one_line;
use crate::source::Slot;

/// Render the CloudWatch view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(COLLECTION_PANEL_HEIGHT),
        Constraint::Length(LOG_PANEL_HEIGHT),
        Constraint::Min(4),
    ])
    .split(area);

    render_collection(frame, app, chunks[0]);
    render_log(frame, app, chunks[1]);
    render_digest(frame, app, chunks[2]);
}

fn render_collection(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.cloudwatch;

    let date = if app.input_mode == InputMode::Date {
        Span::styled(
            format!("{}_", state.date_input),
            Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD),
        )
    } else {
        match state.target_date {
            Some(date) => Span::styled(
                date.format("%Y-%m-%d").to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            None => Span::styled("backend default", Style::default().add_modifier(Modifier::DIM)),
        }
    };

    let busy = app.is_loading(Slot::Collection);
    let first = Line::from(vec![
        Span::raw(" Target date: "),
        date,
        Span::raw("  "),
        Span::styled(
            "[d:date] [c:collect] [t:status] [w:stop watching]",
            if busy {
                Style::default().add_modifier(Modifier::DIM)
            } else {
                Style::default()
            },
        ),
    ]);

    let mut second = vec![Span::raw(" Job: ")];
    match &state.job_status {
        Some(status) => second.push(Span::styled(
            status.clone(),
            app.theme.tone_style(Tone::for_job_status(status)),
        )),
        None => second.push(Span::styled("-", Style::default().add_modifier(Modifier::DIM))),
    }
    if let Some(progress) = state.progress {
        second.push(Span::raw(format!("  {}", progress_bar(progress, 20))));
    }
    second.push(Span::raw("  Stream: "));
    let stream_tone = match &state.stream {
        StreamState::Connected => Tone::Good,
        StreamState::Reconnecting { .. } => Tone::Warning,
        StreamState::Failed(_) => Tone::Bad,
        _ => Tone::Muted,
    };
    second.push(Span::styled(
        state.stream.label(),
        app.theme.tone_style(stream_tone),
    ));
    if let Some(id) = &state.collection_id {
        second.push(Span::styled(
            format!("  ({})", id),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }
    if let Some(message) = state
        .response
        .as_ref()
        .map(|r| r.message.as_str())
        .filter(|m| !m.is_empty())
    {
        second.push(Span::styled(
            format!("  {}", message),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    let paragraph = Paragraph::new(vec![first, Line::from(second)])
        .block(app.theme.block(" CloudWatch slow log collection "));
    frame.render_widget(paragraph, area);
}

/// `[#####.....] 50%`
fn progress_bar(percent: f64, width: usize) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let filled = ((percent / 100.0) * width as f64).round() as usize;
    format!(
        "[{}{}] {:.0}%",
        "#".repeat(filled),
        ".".repeat(width - filled),
        percent
    )
}

fn render_log(frame: &mut Frame, app: &App, area: Rect) {
    let log = &app.cloudwatch.log;
    let visible = area.height.saturating_sub(2) as usize;
    let start = log.len().saturating_sub(visible);

    let lines: Vec<Line> = log[start..]
        .iter()
        .map(|line| {
            let mut spans = Vec::new();
            if let Some(ts) = &line.timestamp {
                spans.push(Span::styled(
                    format!(" {} ", ts),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            } else {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(
                format!("{:<6}", line.level),
                app.theme.tone_style(Tone::for_job_status(&line.level)),
            ));
            spans.push(Span::raw(line.message.clone()));
            Line::from(spans)
        })
        .collect();

    let title = format!(" Progress ({} lines) ", log.len());
    let paragraph = if lines.is_empty() {
        Paragraph::new(" No collection running").style(Style::default().add_modifier(Modifier::DIM))
    } else {
        Paragraph::new(lines)
    };
    frame.render_widget(paragraph.block(app.theme.block(title)), area);
}

fn render_digest(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.cloudwatch;
    let stats = app.digest_page();
    let total = app.visible_digest().len();

    let month = if state.digest_month.is_empty() {
        String::new()
    } else {
        format!(" {}", state.digest_month)
    };
    let title = format!(" Digest statistics{} ({}){} ", month, total, filter_info(app));
    let block = app
        .theme
        .block(title)
        .title_bottom(page_bar(&state.digest_pager));

    if stats.is_empty() {
        let message = empty_message(app, Slot::Digest, state.loaded, "digest statistics");
        let paragraph = Paragraph::new(format!(" {}", message))
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Instance"),
        Cell::from("User"),
        Cell::from("Execs"),
        Cell::from("Total"),
        Cell::from("Avg"),
        Cell::from("Lock"),
        Cell::from("Examined"),
        Cell::from("Sent"),
        Cell::from("Query"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = stats
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(s.instance_id.clone()),
                Cell::from(s.user.clone()),
                Cell::from(thousands(s.sum_stats.execution_count)),
                Cell::from(seconds(s.sum_stats.total_time)),
                Cell::from(seconds(s.avg_stats.avg_time)),
                Cell::from(seconds(s.avg_stats.avg_lock_time)),
                Cell::from(number(s.avg_stats.avg_rows_examined)),
                Cell::from(number(s.avg_stats.avg_rows_sent)),
                Cell::from(one_line(&s.digest_query)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Length(9),
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Fill(4),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut table_state = TableState::default();
    table_state.select(Some(state.selected.min(stats.len().saturating_sub(1))));

    frame.render_stateful_widget(table, area, &mut table_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(50.0, 10), "[#####.....] 50%");
        assert_eq!(progress_bar(150.0, 4), "[####] 100%");
        assert_eq!(progress_bar(-3.0, 4), "[....] 0%");
    }
}
