//! Statistics view rendering.
//!
//! Monthly aggregates per instance, a bar chart of selected metrics and
//! per-user aggregates. Each panel keeps its own instance filter.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use super::theme::Tone;
use super::SUMMARY_BAR_HEIGHT;
use crate::api::SqlStatistics;
use crate::app::{App, StatsPanel};
use crate::data::format::{number, seconds, thousands};
use crate::data::{chart_bars, ChartBar, Metric};
use crate::source::Slot;

/// Render the Statistics view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(SUMMARY_BAR_HEIGHT),
        Constraint::Min(4),
    ])
    .split(area);

    render_summary(frame, app, chunks[0]);

    let state = &app.statistics;
    if !state.loaded {
        let message = if app.is_loading(Slot::Statistics) {
            " Loading..."
        } else {
            " No statistics loaded"
        };
        render_message(frame, app, chunks[1], message);
        return;
    }
    if state.bundle.is_empty_month() {
        let message = format!(
            " No statistics for {}. Press C to calculate them.",
            state.month.label()
        );
        render_message(frame, app, chunks[1], &message);
        return;
    }

    match state.panel {
        StatsPanel::Instances => render_sql_table(frame, app, chunks[1]),
        StatsPanel::Chart => render_chart(frame, app, chunks[1]),
        StatsPanel::Users => render_user_table(frame, app, chunks[1]),
    }
}

fn render_message(frame: &mut Frame, app: &App, area: Rect, message: &str) {
    let paragraph = Paragraph::new(message.to_string())
        .style(Style::default().add_modifier(Modifier::DIM))
        .block(app.theme.block(format!(" {} ", app.statistics.panel.label())));
    frame.render_widget(paragraph, area);
}

fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.statistics;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let panel = state.panel;
    let filter = state
        .selection(panel)
        .display_text(state.instances_for(panel).len());

    let mut spans = vec![
        Span::raw(" Month: "),
        Span::styled(state.month.label(), bold),
        Span::raw(" [m/n] │ Compare: "),
        Span::styled(if state.compare { "on" } else { "off" }, bold),
        Span::raw(" [v] │ Panel: "),
        Span::styled(panel.label(), bold),
        Span::raw(" [f] │ Instances: "),
        Span::styled(filter, bold),
        Span::raw(" [i]"),
    ];
    if panel == StatsPanel::Chart {
        let metrics: Vec<&str> = state.metrics.iter().map(|m| m.label()).collect();
        spans.push(Span::raw(format!(" │ Metrics: {} [g]", metrics.join(", "))));
    }
    if app.is_loading(Slot::Calculate) {
        spans.push(Span::styled(
            " │ Calculating...",
            Style::default().fg(app.theme.warning),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(app.theme.block(" Statistics "));
    frame.render_widget(paragraph, area);
}

/// `value (+12.5%)` against the previous month, colored by direction.
fn compared(app: &App, text: String, current: f64, previous: Option<f64>) -> Cell<'static> {
    match previous {
        Some(prev) if app.statistics.compare => {
            let change = if prev == 0.0 {
                String::new()
            } else {
                format!(" ({:+.1}%)", (current - prev) / prev * 100.0)
            };
            Cell::from(format!("{}{}", text, change))
                .style(app.theme.tone_style(Tone::for_change(current, prev)))
        }
        _ => Cell::from(text),
    }
}

fn render_sql_table(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.statistics;
    let stats = state
        .sql_instances
        .filter(&state.bundle.sql, |s| s.instance_id.as_str());

    let header = Row::new(vec![
        Cell::from("Instance"),
        Cell::from("Slow"),
        Cell::from("Digests"),
        Cell::from("Execs"),
        Cell::from("Exec time"),
        Cell::from("Avg time"),
        Cell::from("Examined"),
        Cell::from("R/W/DDL/Commit"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = stats
        .iter()
        .map(|s| {
            let prev = state.bundle.previous_for(&s.instance_id);
            let prev_of = |metric: Metric| prev.map(|p| metric.value(p));
            Row::new(vec![
                Cell::from(s.instance_id.clone()),
                compared(
                    app,
                    thousands(s.total_slow_query_count),
                    Metric::SlowQueryCount.value(s),
                    prev_of(Metric::SlowQueryCount),
                ),
                Cell::from(thousands(s.unique_digest_count)),
                compared(
                    app,
                    thousands(s.total_execution_count),
                    Metric::ExecutionCount.value(s),
                    prev_of(Metric::ExecutionCount),
                ),
                compared(
                    app,
                    seconds(s.total_execution_time),
                    Metric::ExecutionTime.value(s),
                    prev_of(Metric::ExecutionTime),
                ),
                compared(
                    app,
                    seconds(s.avg_execution_time),
                    Metric::AvgExecutionTime.value(s),
                    prev_of(Metric::AvgExecutionTime),
                ),
                Cell::from(thousands(s.total_rows_examined)),
                Cell::from(query_mix(s)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Length(8),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Length(16),
        Constraint::Length(14),
        Constraint::Length(18),
    ];

    let title = format!(" SQL statistics {} ({}) ", state.month, stats.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(app.theme.block(title))
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut table_state = TableState::default();
    table_state.select(Some(state.selected.min(stats.len().saturating_sub(1))));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn query_mix(s: &SqlStatistics) -> String {
    format!(
        "{}/{}/{}/{}",
        s.read_query_count, s.write_query_count, s.ddl_query_count, s.commit_query_count
    )
}

fn render_user_table(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.statistics;
    let users = state
        .user_instances
        .filter(&state.bundle.users, |s| s.instance_id.as_str());

    let header = Row::new(vec![
        Cell::from("Instance"),
        Cell::from("User"),
        Cell::from("Queries"),
        Cell::from("Execs"),
        Cell::from("Exec time"),
        Cell::from("Avg time"),
        Cell::from("R/W/DDL/Commit"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = users
        .iter()
        .map(|u| {
            let prev = state.compare.then(|| {
                state
                    .bundle
                    .prev_users
                    .iter()
                    .find(|p| p.instance_id == u.instance_id && p.user == u.user)
            });
            let prev_time = prev.flatten().map(|p| p.total_exec_time);
            Row::new(vec![
                Cell::from(u.instance_id.clone()),
                Cell::from(u.user.clone()),
                Cell::from(thousands(u.total_queries)),
                Cell::from(thousands(u.total_exec_count)),
                compared(app, seconds(u.total_exec_time), u.total_exec_time, prev_time),
                Cell::from(seconds(u.avg_execution_time)),
                Cell::from(format!(
                    "{}/{}/{}/{}",
                    u.read_query_count, u.write_query_count, u.ddl_query_count, u.commit_query_count
                )),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Length(9),
        Constraint::Length(10),
        Constraint::Length(18),
        Constraint::Length(10),
        Constraint::Length(18),
    ];

    let title = format!(" User statistics {} ({}) ", state.month, users.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(app.theme.block(title))
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut table_state = TableState::default();
    table_state.select(Some(state.selected.min(users.len().saturating_sub(1))));
    frame.render_stateful_widget(table, area, &mut table_state);
}

/// Bar value and its label; seconds keep two decimals.
fn bar_value(metric: Metric, value: f64) -> (u64, String) {
    let text = if metric.is_seconds() {
        seconds(value)
    } else {
        number(value)
    };
    let scaled = if metric.is_seconds() {
        value * 100.0
    } else {
        value
    };
    (scaled.max(0.0).round() as u64, text)
}

fn render_chart(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.statistics;
    let bars = chart_bars(
        &state.bundle,
        &state.chart_instances,
        &state.metrics,
        state.compare,
    );
    let metrics: Vec<Metric> = state.metrics.iter().collect();

    if metrics.is_empty() || bars.is_empty() {
        render_message(frame, app, area, " Nothing to plot. Press g to pick metrics.");
        return;
    }

    let chunks = Layout::vertical(vec![Constraint::Fill(1); metrics.len()]).split(area);
    for (metric, chunk) in metrics.iter().zip(chunks.iter()) {
        let of_metric: Vec<&ChartBar> = bars.iter().filter(|b| b.metric == *metric).collect();
        render_metric_chart(frame, app, *chunk, *metric, &of_metric);
    }
}

fn render_metric_chart(frame: &mut Frame, app: &App, area: Rect, metric: Metric, bars: &[&ChartBar]) {
    let current_style = Style::default().fg(app.theme.highlight);
    let previous_style = Style::default().add_modifier(Modifier::DIM);

    let mut chart = BarChart::default()
        .block(app.theme.block(format!(" {} ", metric.label())))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .group_gap(1);

    for bar in bars {
        let (value, text) = bar_value(metric, bar.value);
        let mut group = vec![Bar::default()
            .value(value)
            .text_value(text)
            .style(current_style)];
        if let Some(previous) = bar.previous {
            let (value, text) = bar_value(metric, previous);
            group.push(
                Bar::default()
                    .value(value)
                    .text_value(format!("{} (prev)", text))
                    .style(previous_style),
            );
        }
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(bar.instance.clone()))
                .bars(&group),
        );
    }

    frame.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_values_scale_seconds() {
        assert_eq!(bar_value(Metric::SlowQueryCount, 1234.0), (1234, "1,234".to_string()));
        assert_eq!(bar_value(Metric::AvgExecutionTime, 1.5), (150, "1.50s".to_string()));
    }

    #[test]
    fn test_query_mix() {
        let stat = SqlStatistics {
            read_query_count: 5,
            write_query_count: 2,
            ddl_query_count: 0,
            commit_query_count: 1,
            ..Default::default()
        };
        assert_eq!(query_mix(&stat), "5/2/0/1");
    }
}
