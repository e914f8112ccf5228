//! Monthly statistics: instance filters, comparisons and chart metrics.

use crate::api::{SqlStatistics, UserStatistics};

use super::month::YearMonth;

/// Statistics of a month together with the month before it.
///
/// Each of the four lists is fetched independently. A failed fetch leaves
/// its list empty and records a message in `failures`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsBundle {
    pub month: Option<YearMonth>,
    pub sql: Vec<SqlStatistics>,
    pub users: Vec<UserStatistics>,
    pub prev_sql: Vec<SqlStatistics>,
    pub prev_users: Vec<UserStatistics>,
    /// Whether the selected month's SQL statistics were fetched successfully.
    pub sql_fetched: bool,
    /// Whether the selected month's user statistics were fetched successfully.
    pub users_fetched: bool,
    pub failures: Vec<String>,
}

impl StatisticsBundle {
    /// True when both lists of the selected month were fetched and both are
    /// empty: the backend simply has nothing for that month.
    pub fn is_empty_month(&self) -> bool {
        self.sql_fetched && self.users_fetched && self.sql.is_empty() && self.users.is_empty()
    }

    /// Previous month's row for `instance_id`.
    pub fn previous_for(&self, instance_id: &str) -> Option<&SqlStatistics> {
        self.prev_sql.iter().find(|s| s.instance_id == instance_id)
    }
}

/// Instance ids in order of first appearance.
pub fn distinct_instances<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for id in ids {
        if !seen.iter().any(|s| s == id) {
            seen.push(id.to_string());
        }
    }
    seen
}

/// A multi-select instance filter.
///
/// An empty selection shows everything.
///
/// ```
/// use slowquery_console::data::InstanceSelection;
///
/// let instances = vec!["a".to_string(), "b".to_string()];
/// let mut selection = InstanceSelection::default();
/// assert!(selection.matches("a"));
///
/// selection.toggle_all(&instances);
/// assert_eq!(selection.len(), 2);
/// selection.toggle_all(&instances);
/// assert!(selection.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceSelection {
    selected: Vec<String>,
}

impl InstanceSelection {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    /// Whether rows of `id` are shown.
    pub fn matches(&self, id: &str) -> bool {
        self.selected.is_empty() || self.contains(id)
    }

    pub fn toggle(&mut self, id: &str) {
        if let Some(pos) = self.selected.iter().position(|s| s == id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(id.to_string());
        }
    }

    /// Select every instance, or none when all are already selected.
    pub fn toggle_all(&mut self, instances: &[String]) {
        if self.selected.len() == instances.len() {
            self.selected.clear();
        } else {
            self.selected = instances.to_vec();
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Forget ids that are no longer offered.
    pub fn retain_known(&mut self, instances: &[String]) {
        self.selected.retain(|s| instances.contains(s));
    }

    /// Summary shown on the filter button.
    pub fn display_text(&self, total: usize) -> String {
        match self.selected.len() {
            0 => "All instances".to_string(),
            n if n == total => "All selected".to_string(),
            n => format!("{} selected", n),
        }
    }

    /// Keep the items whose instance passes the filter.
    pub fn filter<'a, T>(&self, items: &'a [T], instance: impl Fn(&T) -> &str) -> Vec<&'a T> {
        items.iter().filter(|item| self.matches(instance(item))).collect()
    }
}

/// Values that can be plotted per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    SlowQueryCount,
    ExecutionCount,
    ExecutionTime,
    AvgExecutionTime,
    RowsExamined,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::SlowQueryCount,
        Metric::ExecutionCount,
        Metric::ExecutionTime,
        Metric::AvgExecutionTime,
        Metric::RowsExamined,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::SlowQueryCount => "Slow queries",
            Metric::ExecutionCount => "Executions",
            Metric::ExecutionTime => "Exec time (s)",
            Metric::AvgExecutionTime => "Avg time (s)",
            Metric::RowsExamined => "Rows examined",
        }
    }

    pub fn value(&self, stat: &SqlStatistics) -> f64 {
        match self {
            Metric::SlowQueryCount => stat.total_slow_query_count as f64,
            Metric::ExecutionCount => stat.total_execution_count as f64,
            Metric::ExecutionTime => stat.total_execution_time,
            Metric::AvgExecutionTime => stat.avg_execution_time,
            Metric::RowsExamined => stat.total_rows_examined as f64,
        }
    }

    /// Whether values are seconds rather than counts.
    pub fn is_seconds(&self) -> bool {
        matches!(self, Metric::ExecutionTime | Metric::AvgExecutionTime)
    }
}

/// Metrics currently plotted. Starts with slow query and execution counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSelection {
    selected: Vec<Metric>,
}

impl Default for MetricSelection {
    fn default() -> Self {
        Self {
            selected: vec![Metric::SlowQueryCount, Metric::ExecutionCount],
        }
    }
}

impl MetricSelection {
    pub fn contains(&self, metric: Metric) -> bool {
        self.selected.contains(&metric)
    }

    pub fn toggle(&mut self, metric: Metric) {
        if let Some(pos) = self.selected.iter().position(|m| *m == metric) {
            self.selected.remove(pos);
        } else {
            self.selected.push(metric);
        }
    }

    /// Selected metrics in the fixed display order.
    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL.into_iter().filter(|m| self.contains(*m))
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// One bar of the statistics chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub instance: String,
    pub metric: Metric,
    pub value: f64,
    /// Previous month's value, when comparing and the instance has one.
    pub previous: Option<f64>,
}

/// Bars for every shown instance and selected metric, grouped by instance.
pub fn chart_bars(
    bundle: &StatisticsBundle,
    instances: &InstanceSelection,
    metrics: &MetricSelection,
    compare: bool,
) -> Vec<ChartBar> {
    let mut bars = Vec::new();
    for stat in instances.filter(&bundle.sql, |s| s.instance_id.as_str()) {
        let previous = if compare {
            bundle.previous_for(&stat.instance_id)
        } else {
            None
        };
        for metric in metrics.iter() {
            bars.push(ChartBar {
                instance: stat.instance_id.clone(),
                metric,
                value: metric.value(stat),
                previous: previous.map(|p| metric.value(p)),
            });
        }
    }
    bars
}
