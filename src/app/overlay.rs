//! Modal overlays drawn on top of the current view.

use crate::api::ExplainPlan;
use crate::data::{format_sql, Metric, QueryPlan};

use super::views::StatsPanel;

/// What a [`Picker`] edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerTarget {
    /// Single instance filter of the slow query list.
    MonitorInstance,
    /// Single instance filter of the plan list.
    PlansInstance,
    /// Multi-select instance filter of a statistics panel.
    StatsInstances(StatsPanel),
    /// Plotted chart metrics.
    Metrics,
    /// Statistics month.
    Month,
}

impl PickerTarget {
    /// Multi-select pickers toggle entries and stay open.
    pub fn is_multi(&self) -> bool {
        matches!(self, PickerTarget::StatsInstances(_) | PickerTarget::Metrics)
    }

    pub fn title(&self) -> String {
        match self {
            PickerTarget::MonitorInstance | PickerTarget::PlansInstance => "Instance".to_string(),
            PickerTarget::StatsInstances(panel) => format!("Instances: {}", panel.label()),
            PickerTarget::Metrics => "Chart metrics".to_string(),
            PickerTarget::Month => "Month".to_string(),
        }
    }
}

/// A list of options with a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Picker {
    pub target: PickerTarget,
    pub options: Vec<String>,
    pub cursor: usize,
}

impl Picker {
    pub fn new(target: PickerTarget, options: Vec<String>, cursor: usize) -> Self {
        let cursor = cursor.min(options.len().saturating_sub(1));
        Self {
            target,
            options,
            cursor,
        }
    }

    pub fn up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn down(&mut self) {
        if self.cursor + 1 < self.options.len() {
            self.cursor += 1;
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.options.get(self.cursor).map(String::as_str)
    }
}

/// Options of the metric picker, in display order.
pub fn metric_options() -> Vec<String> {
    Metric::ALL.iter().map(|m| m.label().to_string()).collect()
}

/// Formatted SQL with a title.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlOverlay {
    pub title: String,
    /// Pretty-printed text, also what `y` copies.
    pub sql: String,
    pub scroll: u16,
}

impl SqlOverlay {
    pub fn new(title: impl Into<String>, sql: &str) -> Self {
        Self {
            title: title.into(),
            sql: format_sql(sql),
            scroll: 0,
        }
    }
}

/// Query information, plan tree and table access details of a plan.
#[derive(Debug, Clone)]
pub struct PlanOverlay {
    pub plan: ExplainPlan,
    /// `None` when there is no parsable `EXPLAIN FORMAT=JSON` document.
    pub parsed: Option<QueryPlan>,
    pub sql: String,
    pub scroll: u16,
}

impl PlanOverlay {
    pub fn new(plan: ExplainPlan) -> Self {
        let parsed = plan
            .explain_result
            .as_ref()
            .and_then(|result| QueryPlan::parse(&result.json));
        let sql = format_sql(&plan.sql_text);
        Self {
            plan,
            parsed,
            sql,
            scroll: 0,
        }
    }
}

/// The overlay currently shown, if any.
#[derive(Debug, Clone)]
pub enum Overlay {
    Sql(SqlOverlay),
    Plan(Box<PlanOverlay>),
    Picker(Picker),
}

impl Overlay {
    pub fn scroll_down(&mut self, n: u16) {
        match self {
            Overlay::Sql(o) => o.scroll = o.scroll.saturating_add(n),
            Overlay::Plan(o) => o.scroll = o.scroll.saturating_add(n),
            Overlay::Picker(p) => (0..n).for_each(|_| p.down()),
        }
    }

    pub fn scroll_up(&mut self, n: u16) {
        match self {
            Overlay::Sql(o) => o.scroll = o.scroll.saturating_sub(n),
            Overlay::Plan(o) => o.scroll = o.scroll.saturating_sub(n),
            Overlay::Picker(p) => (0..n).for_each(|_| p.up()),
        }
    }

    /// Text copied by `y`.
    pub fn copy_text(&self) -> Option<&str> {
        match self {
            Overlay::Sql(o) => Some(&o.sql),
            Overlay::Plan(o) => Some(&o.sql),
            Overlay::Picker(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExplainResult;

    #[test]
    fn test_picker_cursor_stays_in_range() {
        let mut picker = Picker::new(
            PickerTarget::Month,
            vec!["2025-01".into(), "2025-02".into()],
            5,
        );
        assert_eq!(picker.cursor, 1);
        picker.down();
        assert_eq!(picker.current(), Some("2025-02"));
        picker.up();
        picker.up();
        assert_eq!(picker.current(), Some("2025-01"));

        let empty = Picker::new(PickerTarget::PlansInstance, Vec::new(), 0);
        assert_eq!(empty.current(), None);
    }

    #[test]
    fn test_multi_select_targets() {
        assert!(PickerTarget::Metrics.is_multi());
        assert!(PickerTarget::StatsInstances(StatsPanel::Users).is_multi());
        assert!(!PickerTarget::MonitorInstance.is_multi());
        assert_eq!(metric_options().len(), Metric::ALL.len());
    }

    #[test]
    fn test_plan_overlay_parses_json() {
        let plan = ExplainPlan {
            pid: 7,
            created_at: String::new(),
            instance: "orders-prod-1".to_string(),
            time: 3.0,
            sql_text: "select * from orders where id = 1".to_string(),
            explain_result: Some(ExplainResult {
                json: serde_json::json!({
                    "query_block": {
                        "select_id": 1,
                        "cost_info": {"query_cost": "1.00"},
                        "table": {"table_name": "orders", "access_type": "const", "rows_examined_per_scan": 1}
                    }
                }),
                tree: String::new(),
                error: None,
            }),
        };

        let mut overlay = Overlay::Plan(Box::new(PlanOverlay::new(plan)));
        let Overlay::Plan(ref inner) = overlay else {
            unreachable!()
        };
        assert!(inner.parsed.is_some());
        assert!(inner.sql.starts_with("SELECT"));

        overlay.scroll_down(3);
        overlay.scroll_up(5);
        assert_eq!(overlay.copy_text().map(|s| s.starts_with("SELECT")), Some(true));
    }
}
