//! Instances view rendering: the RDS inventory.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use super::common::{empty_message, filter_info};
use super::theme::Tone;
use super::SUMMARY_BAR_HEIGHT;
use crate::app::App;
use crate::data::format::local_time;
use crate::data::inventory::{endpoint_text, has_real_time_tag, latest_update, real_time_count};
use crate::source::Slot;

/// Render the Instances view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(SUMMARY_BAR_HEIGHT),
        Constraint::Min(4),
    ])
    .split(area);

    render_summary(frame, app, chunks[0]);
    render_table(frame, app, chunks[1]);
}

fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.instances;
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let updated = latest_update(&state.instances)
        .map(local_time)
        .unwrap_or_else(|| "-".to_string());

    let mut spans = vec![
        Span::raw(" Instances: "),
        Span::styled(state.instances.len().to_string(), bold),
        Span::raw(" │ Real-time monitored: "),
        Span::styled(real_time_count(&state.instances).to_string(), bold),
        Span::raw(" │ Last update: "),
        Span::styled(updated, bold),
        Span::raw(" │ "),
    ];

    if app.is_loading(Slot::RdsCollect) {
        spans.push(Span::styled(
            "Collecting...",
            Style::default().fg(app.theme.warning),
        ));
    } else {
        spans.push(Span::raw("[c:collect]"));
        if let Some(collect) = &state.collect {
            let tone = if collect.is_success() {
                Tone::Good
            } else {
                Tone::Bad
            };
            spans.push(Span::styled(
                format!(" last run: {} ({})", collect.status, collect.collected_count),
                app.theme.tone_style(tone),
            ));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(app.theme.block(" RDS inventory "));
    frame.render_widget(paragraph, area);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.instances;
    let instances = app.visible_instances();

    let title = format!(
        " Instances ({}/{}){} ",
        instances.len(),
        state.instances.len(),
        filter_info(app)
    );
    let block = app.theme.block(title);

    if instances.is_empty() {
        let message = empty_message(app, Slot::RdsInstances, state.loaded, "instances");
        let paragraph = Paragraph::new(format!(" {}", message))
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Identifier"),
        Cell::from("Engine"),
        Cell::from("Version"),
        Cell::from("Status"),
        Cell::from("Endpoint"),
        Cell::from("Created"),
        Cell::from("RT"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = instances
        .iter()
        .map(|i| {
            let status_style = app.theme.tone_style(Tone::for_instance_status(&i.status));
            Row::new(vec![
                Cell::from(i.identifier.clone()),
                Cell::from(i.engine.clone()),
                Cell::from(i.engine_version.clone()),
                Cell::from(i.status.clone()).style(status_style),
                Cell::from(endpoint_text(i)),
                Cell::from(local_time(&i.instance_create_time)),
                Cell::from(if has_real_time_tag(i) { "●" } else { "" })
                    .style(Style::default().fg(app.theme.healthy)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(2),
        Constraint::Length(14),
        Constraint::Fill(1),
        Constraint::Length(12),
        Constraint::Fill(3),
        Constraint::Length(19),
        Constraint::Length(3),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut table_state = TableState::default();
    table_state.select(Some(state.selected.min(instances.len().saturating_sub(1))));

    frame.render_stateful_widget(table, area, &mut table_state);
}
