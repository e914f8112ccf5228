//! Per-view state.
//!
//! Each view owns its rows, page cursor, selection and filters. Backend
//! payloads are stored as received and only reshaped at render time.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::{
    CollectRdsResponse, CollectionEvent, CollectionResponse, ExplainPlan, ExplainResponse,
    MonitorResponse, QueryStat, RdsInstance, SlowQuery,
};
use crate::data::statistics::distinct_instances;
use crate::data::{InstanceSelection, MetricSelection, Pager, StatisticsBundle, YearMonth};

/// How long the "explain saved" confirmation stays visible.
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(3);

/// Progress log lines kept for the CloudWatch view.
pub const MAX_LOG_LINES: usize = 500;

/// Sorted unique instance names of `items`.
pub fn sorted_instances<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut instances = distinct_instances(names);
    instances.sort();
    instances
}

/// Keep a row cursor inside a list of `len` rows.
pub fn clamp_selection(selected: &mut usize, len: usize) {
    *selected = (*selected).min(len.saturating_sub(1));
}

/// Monitor view: scraper lifecycle, slow query list and EXPLAIN capture.
#[derive(Debug)]
pub struct MonitorState {
    pub status: Option<MonitorResponse>,
    pub queries: Vec<SlowQuery>,
    pub pager: Pager,
    pub instance_filter: Option<String>,
    /// Instances offered by the filter, from the last unfiltered page.
    pub instances: Vec<String>,
    pub selected: usize,
    /// PID typed by the user or taken from the selected row.
    pub pid_input: String,
    pub explain: Option<ExplainResponse>,
    pub explain_saved_at: Option<Instant>,
    pub loaded: bool,
}

impl MonitorState {
    pub fn new(page_size: u32) -> Self {
        Self {
            status: None,
            queries: Vec::new(),
            pager: Pager::new(page_size),
            instance_filter: None,
            instances: Vec::new(),
            selected: 0,
            pid_input: String::new(),
            explain: None,
            explain_saved_at: None,
            loaded: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.as_ref().is_some_and(MonitorResponse::is_running)
    }

    pub fn pid(&self) -> Option<i64> {
        self.pid_input.parse().ok()
    }

    /// Whether the "explain saved" confirmation is still showing.
    pub fn confirmation_visible(&self) -> bool {
        self.explain_saved_at
            .is_some_and(|at| at.elapsed() < CONFIRMATION_TTL)
    }
}

/// Plans view: recent EXPLAIN plans.
#[derive(Debug)]
pub struct PlansState {
    pub plans: Vec<ExplainPlan>,
    pub pager: Pager,
    pub instance_filter: Option<String>,
    pub instances: Vec<String>,
    pub selected: usize,
    pub loaded: bool,
}

impl PlansState {
    pub fn new(page_size: u32) -> Self {
        Self {
            plans: Vec::new(),
            pager: Pager::new(page_size),
            instance_filter: None,
            instances: Vec::new(),
            selected: 0,
            loaded: false,
        }
    }
}

/// State of the collection progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamState {
    Idle,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, max: u32 },
    Finished,
    Failed(String),
}

impl StreamState {
    pub fn label(&self) -> String {
        match self {
            StreamState::Idle => "idle".to_string(),
            StreamState::Connecting => "connecting".to_string(),
            StreamState::Connected => "live".to_string(),
            StreamState::Reconnecting { attempt, max } => {
                format!("reconnecting {}/{}", attempt, max)
            }
            StreamState::Finished => "finished".to_string(),
            StreamState::Failed(_) => "failed".to_string(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            StreamState::Connecting | StreamState::Connected | StreamState::Reconnecting { .. }
        )
    }
}

/// One line of the collection progress log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    pub level: String,
    pub message: String,
    pub timestamp: Option<String>,
}

/// CloudWatch view: collection job, progress log and digest table.
#[derive(Debug)]
pub struct CloudWatchState {
    pub date_input: String,
    pub target_date: Option<NaiveDate>,
    pub response: Option<CollectionResponse>,
    pub collection_id: Option<String>,
    pub job_status: Option<String>,
    pub progress: Option<f64>,
    pub stream: StreamState,
    pub log: Vec<LogLine>,
    pub digest_month: String,
    pub digest: Vec<QueryStat>,
    pub digest_pager: Pager,
    pub selected: usize,
    pub loaded: bool,
}

impl CloudWatchState {
    pub fn new(digest_page_size: u32) -> Self {
        Self {
            date_input: String::new(),
            target_date: None,
            response: None,
            collection_id: None,
            job_status: None,
            progress: None,
            stream: StreamState::Idle,
            log: Vec::new(),
            digest_month: String::new(),
            digest: Vec::new(),
            digest_pager: Pager::new(digest_page_size),
            selected: 0,
            loaded: false,
        }
    }

    /// Forget the previous job and follow `collection_id`.
    pub fn start_watch(&mut self, collection_id: String) {
        self.collection_id = Some(collection_id);
        self.job_status = None;
        self.progress = None;
        self.stream = StreamState::Connecting;
        self.log.clear();
    }

    pub fn push_log(&mut self, level: &str, message: impl Into<String>, timestamp: Option<String>) {
        self.log.push(LogLine {
            level: level.to_string(),
            message: message.into(),
            timestamp,
        });
        if self.log.len() > MAX_LOG_LINES {
            let excess = self.log.len() - MAX_LOG_LINES;
            self.log.drain(..excess);
        }
    }

    /// Fold a backend progress frame into the job state.
    pub fn apply_event(&mut self, event: CollectionEvent) {
        match event {
            CollectionEvent::Status {
                status,
                message,
                progress,
            } => {
                if progress.is_some() {
                    self.progress = progress;
                }
                let text = match message {
                    Some(message) => format!("{}: {}", status, message),
                    None => status.clone(),
                };
                self.push_log("status", text, None);
                self.job_status = Some(status);
            }
            CollectionEvent::Log {
                message,
                level,
                timestamp,
            } => {
                let level = level.unwrap_or_else(|| "info".to_string());
                self.push_log(&level, message, timestamp);
            }
            CollectionEvent::Other => {}
        }
    }
}

/// Statistics panels with their own instance filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatsPanel {
    #[default]
    Instances,
    Chart,
    Users,
}

impl StatsPanel {
    pub fn next(self) -> Self {
        match self {
            StatsPanel::Instances => StatsPanel::Chart,
            StatsPanel::Chart => StatsPanel::Users,
            StatsPanel::Users => StatsPanel::Instances,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatsPanel::Instances => "Per instance",
            StatsPanel::Chart => "Chart",
            StatsPanel::Users => "Per user",
        }
    }
}

/// Statistics view: monthly aggregates with comparisons.
#[derive(Debug)]
pub struct StatisticsState {
    pub month: YearMonth,
    pub picker: Vec<YearMonth>,
    pub bundle: StatisticsBundle,
    pub panel: StatsPanel,
    pub sql_instances: InstanceSelection,
    pub chart_instances: InstanceSelection,
    pub user_instances: InstanceSelection,
    pub compare: bool,
    pub metrics: MetricSelection,
    pub selected: usize,
    pub loaded: bool,
}

impl StatisticsState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            month: YearMonth::default_for(today),
            picker: YearMonth::picker(today),
            bundle: StatisticsBundle::default(),
            panel: StatsPanel::default(),
            sql_instances: InstanceSelection::default(),
            chart_instances: InstanceSelection::default(),
            user_instances: InstanceSelection::default(),
            compare: false,
            metrics: MetricSelection::default(),
            selected: 0,
            loaded: false,
        }
    }

    /// Instances of the SQL statistics, in backend order.
    pub fn sql_instance_ids(&self) -> Vec<String> {
        distinct_instances(self.bundle.sql.iter().map(|s| s.instance_id.as_str()))
    }

    /// Instances of the per-user statistics, in backend order.
    pub fn user_instance_ids(&self) -> Vec<String> {
        distinct_instances(self.bundle.users.iter().map(|s| s.instance_id.as_str()))
    }

    pub fn instances_for(&self, panel: StatsPanel) -> Vec<String> {
        match panel {
            StatsPanel::Instances | StatsPanel::Chart => self.sql_instance_ids(),
            StatsPanel::Users => self.user_instance_ids(),
        }
    }

    pub fn selection(&self, panel: StatsPanel) -> &InstanceSelection {
        match panel {
            StatsPanel::Instances => &self.sql_instances,
            StatsPanel::Chart => &self.chart_instances,
            StatsPanel::Users => &self.user_instances,
        }
    }

    pub fn selection_mut(&mut self, panel: StatsPanel) -> &mut InstanceSelection {
        match panel {
            StatsPanel::Instances => &mut self.sql_instances,
            StatsPanel::Chart => &mut self.chart_instances,
            StatsPanel::Users => &mut self.user_instances,
        }
    }

    /// Rows in the focused panel after its instance filter.
    pub fn visible_rows(&self) -> usize {
        match self.panel {
            StatsPanel::Instances => self
                .sql_instances
                .filter(&self.bundle.sql, |s| s.instance_id.as_str())
                .len(),
            StatsPanel::Chart => 0,
            StatsPanel::Users => self
                .user_instances
                .filter(&self.bundle.users, |s| s.instance_id.as_str())
                .len(),
        }
    }

    /// Replace the bundle, dropping filter entries for vanished instances.
    pub fn set_bundle(&mut self, bundle: StatisticsBundle) {
        self.bundle = bundle;
        let sql = self.sql_instance_ids();
        let users = self.user_instance_ids();
        self.sql_instances.retain_known(&sql);
        self.chart_instances.retain_known(&sql);
        self.user_instances.retain_known(&users);
        self.selected = 0;
        self.loaded = true;
    }
}

/// Instances view: RDS inventory.
#[derive(Debug, Default)]
pub struct InstancesState {
    pub instances: Vec<RdsInstance>,
    pub collect: Option<CollectRdsResponse>,
    pub selected: usize,
    pub loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SqlStatistics;

    #[test]
    fn test_sorted_instances() {
        let names = ["b-prod", "a-prod", "b-prod"];
        assert_eq!(sorted_instances(names), vec!["a-prod", "b-prod"]);
    }

    #[test]
    fn test_clamp_selection() {
        let mut selected = 7;
        clamp_selection(&mut selected, 3);
        assert_eq!(selected, 2);
        clamp_selection(&mut selected, 0);
        assert_eq!(selected, 0);
    }

    #[test]
    fn test_collection_events_build_log() {
        let mut state = CloudWatchState::new(15);
        state.start_watch("job-1".to_string());
        assert_eq!(state.stream, StreamState::Connecting);

        state.apply_event(CollectionEvent::Status {
            status: "running".to_string(),
            message: Some("Fetched 3/12 log streams".to_string()),
            progress: Some(25.0),
        });
        state.apply_event(CollectionEvent::Log {
            message: "orders-prod-1: 1832 events".to_string(),
            level: None,
            timestamp: None,
        });
        state.apply_event(CollectionEvent::Other);

        assert_eq!(state.job_status.as_deref(), Some("running"));
        assert_eq!(state.progress, Some(25.0));
        assert_eq!(state.log.len(), 2);
        assert_eq!(state.log[0].message, "running: Fetched 3/12 log streams");
        assert_eq!(state.log[1].level, "info");
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = CloudWatchState::new(15);
        for i in 0..(MAX_LOG_LINES + 10) {
            state.push_log("info", format!("line {}", i), None);
        }
        assert_eq!(state.log.len(), MAX_LOG_LINES);
        assert_eq!(state.log[0].message, "line 10");
    }

    #[test]
    fn test_new_bundle_forgets_unknown_instances() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let mut state = StatisticsState::new(today);
        assert_eq!(state.month.to_string(), "2025-02");

        state.sql_instances.toggle("gone");
        state.chart_instances.toggle("kept");
        state.set_bundle(StatisticsBundle {
            sql: vec![SqlStatistics {
                instance_id: "kept".to_string(),
                ..Default::default()
            }],
            sql_fetched: true,
            users_fetched: true,
            ..Default::default()
        });

        assert!(state.sql_instances.is_empty());
        assert!(state.chart_instances.contains("kept"));
        assert_eq!(state.visible_rows(), 1);
    }

    #[test]
    fn test_monitor_pid_and_running() {
        let mut state = MonitorState::new(20);
        assert!(!state.is_running());
        assert_eq!(state.pid(), None);

        state.pid_input = "1234".to_string();
        assert_eq!(state.pid(), Some(1234));

        state.status = Some(MonitorResponse {
            status: "running".to_string(),
            message: String::new(),
            timestamp: String::new(),
        });
        assert!(state.is_running());
        assert!(!state.confirmation_visible());

        state.explain_saved_at = Some(Instant::now());
        assert!(state.confirmation_visible());
    }
}
