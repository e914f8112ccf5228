//! Plans view rendering: recently captured EXPLAIN plans.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use super::common::{empty_message, filter_info, page_bar};
use crate::api::ExplainPlan;
use crate::app::App;
use crate::data::format::{local_time, seconds};
use crate::data::sql::one_line;
use crate::source::Slot;

/// Render the Plans view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.plans;
    let plans = app.visible_plans();

    let instance = state.instance_filter.as_deref().unwrap_or("all instances");
    let title = format!(
        " Explain plans ({}) [i:{}]{} ",
        plans.len(),
        instance,
        filter_info(app)
    );
    let block = app.theme.block(title).title_bottom(page_bar(&state.pager));

    if plans.is_empty() {
        let message = empty_message(app, Slot::Plans, state.loaded, "explain plans");
        let paragraph = Paragraph::new(format!(" {}", message))
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("PID"),
        Cell::from("Instance"),
        Cell::from("Time"),
        Cell::from("Captured"),
        Cell::from("Plan"),
        Cell::from("SQL"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = plans
        .iter()
        .map(|p| {
            Row::new(vec![
                Cell::from(p.pid.to_string()),
                Cell::from(p.instance.clone()),
                Cell::from(seconds(p.time)),
                Cell::from(local_time(&p.created_at)),
                Cell::from(plan_marker(p)),
                Cell::from(one_line(&p.sql_text)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(8),
        Constraint::Fill(2),
        Constraint::Length(9),
        Constraint::Length(19),
        Constraint::Length(6),
        Constraint::Fill(5),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut table_state = TableState::default();
    table_state.select(Some(state.selected.min(plans.len().saturating_sub(1))));

    frame.render_stateful_widget(table, area, &mut table_state);
}

/// Whether the stored plan has a JSON document, failed, or is missing.
fn plan_marker(plan: &ExplainPlan) -> &'static str {
    match &plan.explain_result {
        Some(result) if result.error.is_some() => "error",
        Some(result) if result.json.is_object() => "json",
        Some(_) => "text",
        None => "-",
    }
}
