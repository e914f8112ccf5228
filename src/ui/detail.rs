//! Overlay rendering.
//!
//! SQL text, EXPLAIN plan detail and pickers are drawn as centered modals
//! on top of the current view.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Overlay, Picker, PlanOverlay, SqlOverlay};
use crate::data::format::{local_time, seconds, thousands};
use crate::data::QueryPlan;

/// Minimum width required for the overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 50;
/// Minimum height required for the overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 12;

/// Render the open overlay, if any.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    // Skip rendering if terminal is too small for the overlay
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }

    match &app.overlay {
        Some(Overlay::Sql(sql)) => render_sql(frame, app, area, sql),
        Some(Overlay::Plan(plan)) => render_plan(frame, app, area, plan),
        Some(Overlay::Picker(picker)) => render_picker(frame, app, area, picker),
        None => {}
    }
}

/// Centered rectangle of `percent_x` by `percent_y`, clamped to the
/// minimum overlay size and `max_width` by `max_height`.
fn centered(area: Rect, percent_x: u16, percent_y: u16, max_width: u16, max_height: u16) -> Rect {
    let width = (area.width * percent_x / 100)
        .clamp(MIN_OVERLAY_WIDTH, max_width.max(MIN_OVERLAY_WIDTH))
        .min(area.width);
    let height = (area.height * percent_y / 100)
        .clamp(MIN_OVERLAY_HEIGHT, max_height.max(MIN_OVERLAY_HEIGHT))
        .min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn overlay_block<'a>(app: &App, title: String, footer: &'a str) -> Block<'a> {
    Block::default()
        .title(title)
        .title_bottom(Line::from(footer).style(Style::default().add_modifier(Modifier::DIM)))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight))
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!(" {}", title),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn render_sql(frame: &mut Frame, app: &App, area: Rect, overlay: &SqlOverlay) {
    let overlay_area = centered(area, 90, 80, 120, 40);
    frame.render_widget(Clear, overlay_area);

    let lines: Vec<Line> = overlay.sql.lines().map(|l| Line::from(l.to_string())).collect();
    let block = overlay_block(
        app,
        format!(" {} ", overlay.title),
        " ↑↓:scroll y:copy Esc:close ",
    );
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((overlay.scroll, 0));
    frame.render_widget(paragraph, overlay_area);
}

/// Tree drawing prefix of node `id`, e.g. `│  └─ `.
pub fn tree_prefix(plan: &QueryPlan, id: usize) -> String {
    let mut ancestors = Vec::new();
    let mut current = plan.nodes.get(id).and_then(|n| n.parent);
    while let Some(parent) = current {
        ancestors.push(parent);
        current = plan.nodes.get(parent).and_then(|n| n.parent);
    }
    if ancestors.is_empty() {
        return String::new();
    }

    let mut prefix = String::new();
    // Skip the root; it has no connector column.
    for ancestor in ancestors.iter().rev().skip(1) {
        prefix.push_str(if plan.is_last_child(*ancestor) { "   " } else { "│  " });
    }
    prefix.push_str(if plan.is_last_child(id) { "└─ " } else { "├─ " });
    prefix
}

fn plan_lines(app: &App, overlay: &PlanOverlay) -> Vec<Line<'static>> {
    let plan = &overlay.plan;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut lines = vec![
        Line::from(vec![
            Span::raw(" PID: "),
            Span::styled(plan.pid.to_string(), bold),
            Span::raw("   Instance: "),
            Span::styled(plan.instance.clone(), bold),
            Span::raw("   Time: "),
            Span::styled(seconds(plan.time), Style::default().fg(app.theme.warning)),
        ]),
        Line::from(vec![
            Span::raw(" Captured: "),
            Span::raw(local_time(&plan.created_at)),
        ]),
    ];
    if let Some(cost) = overlay.parsed.as_ref().and_then(QueryPlan::query_cost) {
        lines.push(Line::from(vec![
            Span::raw(" Query cost: "),
            Span::styled(cost.to_string(), bold),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(section("SQL"));
    lines.extend(overlay.sql.lines().map(|l| Line::from(format!("   {}", l))));

    let result = plan.explain_result.as_ref();
    if let Some(error) = result.and_then(|r| r.error.as_deref()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" Explain failed: {}", error),
            Style::default().fg(app.theme.critical),
        )));
    }

    match &overlay.parsed {
        Some(parsed) => {
            lines.push(Line::from(""));
            lines.push(section("Plan"));
            for node in &parsed.nodes {
                let mut spans = vec![
                    Span::raw(format!("   {}", tree_prefix(parsed, node.id))),
                    Span::styled(node.label.clone(), bold),
                ];
                if let Some(cost) = &node.cost {
                    spans.push(Span::styled(format!("  cost={}", cost), dim));
                }
                if let Some(rows) = node.rows {
                    spans.push(Span::styled(format!("  rows={}", thousands(rows)), dim));
                }
                if let Some(filtered) = node.filtered {
                    spans.push(Span::styled(format!("  filtered={}%", filtered), dim));
                }
                for note in &node.notes {
                    spans.push(Span::styled(
                        format!("  [{}]", note),
                        Style::default().fg(app.theme.warning),
                    ));
                }
                lines.push(Line::from(spans));
            }

            if !parsed.tables.is_empty() {
                lines.push(Line::from(""));
                lines.push(section("Tables"));
            }
            for table in &parsed.tables {
                lines.push(Line::from(Span::styled(
                    format!("   {}", table.table_name),
                    Style::default().fg(app.theme.highlight).add_modifier(Modifier::BOLD),
                )));
                for (label, value) in table.fields() {
                    let style = if label == "access_type" && value == "ALL" {
                        Style::default().fg(app.theme.warning)
                    } else {
                        Style::default()
                    };
                    lines.push(Line::from(vec![
                        Span::styled(format!("     {:<20}", label), dim),
                        Span::styled(value, style),
                    ]));
                }
            }
        }
        None => {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(" No JSON plan available", dim)));
        }
    }

    if let Some(tree) = result.map(|r| r.tree.as_str()).filter(|t| !t.is_empty()) {
        lines.push(Line::from(""));
        lines.push(section("Tree"));
        lines.extend(tree.lines().map(|l| Line::from(format!("   {}", l))));
    }

    lines
}

fn render_plan(frame: &mut Frame, app: &App, area: Rect, overlay: &PlanOverlay) {
    let overlay_area = centered(area, 95, 90, 140, 60);
    frame.render_widget(Clear, overlay_area);

    let block = overlay_block(
        app,
        format!(" Explain plan: PID {} ", overlay.plan.pid),
        " ↑↓:scroll y:copy SQL Esc:close ",
    );
    let paragraph = Paragraph::new(plan_lines(app, overlay))
        .block(block)
        .scroll((overlay.scroll, 0));
    frame.render_widget(paragraph, overlay_area);
}

fn render_picker(frame: &mut Frame, app: &App, area: Rect, picker: &Picker) {
    let height = (picker.options.len() as u16 + 2).clamp(MIN_OVERLAY_HEIGHT, 20);
    let overlay_area = centered(area, 40, 50, 60, height);
    frame.render_widget(Clear, overlay_area);

    let multi = picker.target.is_multi();
    let items: Vec<ListItem> = picker
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let checked = app.picker_checked(picker, i);
            let mark = match (multi, checked) {
                (true, true) => "[x] ",
                (true, false) => "[ ] ",
                (false, true) => "(•) ",
                (false, false) => "( ) ",
            };
            ListItem::new(format!("{}{}", mark, option))
        })
        .collect();

    let footer = if multi {
        " Space:toggle a:all Enter/Esc:done "
    } else {
        " Enter:select Esc:cancel "
    };
    let list = List::new(items)
        .block(overlay_block(app, format!(" {} ", picker.target.title()), footer))
        .highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    if !picker.options.is_empty() {
        state.select(Some(picker.cursor));
    }
    frame.render_stateful_widget(list, overlay_area, &mut state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tree_prefix() {
        let plan = QueryPlan::parse(&json!({
            "query_block": {
                "select_id": 1,
                "ordering_operation": {
                    "using_filesort": true,
                    "nested_loop": [
                        {"table": {"table_name": "o", "access_type": "ALL"}},
                        {"table": {"table_name": "c", "access_type": "eq_ref"}}
                    ]
                }
            }
        }))
        .unwrap();

        let prefixes: Vec<String> = plan
            .nodes
            .iter()
            .map(|n| tree_prefix(&plan, n.id))
            .collect();
        assert_eq!(prefixes, vec!["", "└─ ", "   └─ ", "      ├─ ", "      └─ "]);
    }

    #[test]
    fn test_centered_clamps_to_area() {
        let area = Rect::new(0, 0, 60, 20);
        let rect = centered(area, 90, 80, 120, 40);
        assert!(rect.width <= 60 && rect.height <= 20);
        assert!(rect.width >= MIN_OVERLAY_WIDTH);
    }
}
