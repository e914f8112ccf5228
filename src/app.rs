//! Application state and navigation logic.

mod clipboard;
mod overlay;
mod views;

pub use clipboard::{copy_to, osc52_sequence};
pub use overlay::{metric_options, Overlay, Picker, PickerTarget, PlanOverlay, SqlOverlay};
pub use views::{
    CloudWatchState, InstancesState, LogLine, MonitorState, PlansState, StatisticsState,
    StatsPanel, StreamState, CONFIRMATION_TTL,
};

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Local, NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::api::{
    ApiError, AwsInfo, CollectionEvent, ExplainPlan, QueryStat, RdsInstance, SlowQuery,
    WatchEvent,
};
use crate::data::inventory::{latest_update, real_time_count};
use crate::data::{Metric, Ticker};
use crate::source::{DataSource, Reply, Request, Slot, Update};
use crate::ui::Theme;

use views::{clamp_selection, sorted_instances};

/// Longest PID accepted by the PID input. Every 18-digit value fits in an `i64`.
const MAX_PID_DIGITS: usize = 18;

/// Length of a `YYYY-MM-DD` date.
const DATE_LEN: usize = 10;

/// Timers, page sizes and download location.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub status_refresh: Duration,
    pub query_refresh: Duration,
    pub query_page_size: u32,
    pub plan_page_size: u32,
    pub digest_page_size: u32,
    pub download_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            status_refresh: Duration::from_secs(10),
            query_refresh: Duration::from_secs(30),
            query_page_size: 20,
            plan_page_size: 5,
            digest_page_size: 15,
            download_dir: PathBuf::from("."),
        }
    }
}

/// The current view/tab in the TUI.
///
/// SQL text, plan details and pickers are shown as overlays (see
/// [`App::overlay`]) rather than as separate views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Scraper lifecycle, live slow queries and EXPLAIN capture.
    Monitor,
    /// Recently captured EXPLAIN plans.
    Plans,
    /// CloudWatch slow log collection and digest statistics.
    CloudWatch,
    /// Monthly statistics per instance and user.
    Statistics,
    /// RDS inventory.
    Instances,
}

impl View {
    pub const ALL: [View; 5] = [
        View::Monitor,
        View::Plans,
        View::CloudWatch,
        View::Statistics,
        View::Instances,
    ];

    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Monitor => View::Plans,
            View::Plans => View::CloudWatch,
            View::CloudWatch => View::Statistics,
            View::Statistics => View::Instances,
            View::Instances => View::Monitor,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        match self {
            View::Monitor => View::Instances,
            View::Plans => View::Monitor,
            View::CloudWatch => View::Plans,
            View::Statistics => View::CloudWatch,
            View::Instances => View::Statistics,
        }
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Monitor => "Monitor",
            View::Plans => "Plans",
            View::CloudWatch => "CloudWatch",
            View::Statistics => "Statistics",
            View::Instances => "Instances",
        }
    }

    /// Position in the tab bar.
    pub fn index(&self) -> usize {
        View::ALL.iter().position(|v| v == self).unwrap_or(0)
    }
}

/// Where typed characters go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Text filter of the current list.
    Filter,
    /// PID for EXPLAIN capture (digits only).
    Pid,
    /// CloudWatch target date (`YYYY-MM-DD`).
    Date,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub view_stack: Vec<View>,
    pub show_help: bool,
    pub overlay: Option<Overlay>,
    pub input_mode: InputMode,

    // Data source
    source: Box<dyn DataSource>,
    config: AppConfig,
    next_seq: u64,
    latest: HashMap<Slot, u64>,
    in_flight: HashSet<Slot>,
    pub source_error: Option<String>,

    // Per-view state
    pub aws: Option<AwsInfo>,
    pub monitor: MonitorState,
    pub plans: PlansState,
    pub cloudwatch: CloudWatchState,
    pub statistics: StatisticsState,
    pub instances: InstancesState,

    // Timers
    status_ticker: Ticker,
    query_ticker: Ticker,

    // Search/filter
    pub filter_text: String,

    // UI
    pub theme: Theme,

    /// Persistent errors, oldest first, at most one per slot.
    pub banners: Vec<(Slot, String)>,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,

    /// Text waiting to be sent to the terminal clipboard.
    clipboard: Option<String>,
}

impl App {
    /// Create a new App with the given data source.
    pub fn new(source: Box<dyn DataSource>, config: AppConfig) -> Self {
        Self::with_theme(source, config, Theme::auto_detect(), Local::now().date_naive())
    }

    /// Create an App with an explicit theme and today's date.
    pub fn with_theme(
        source: Box<dyn DataSource>,
        config: AppConfig,
        theme: Theme,
        today: NaiveDate,
    ) -> Self {
        let mut query_ticker = Ticker::new(config.query_refresh);
        query_ticker.pause();

        Self {
            running: true,
            current_view: View::Monitor,
            view_stack: Vec::new(),
            show_help: false,
            overlay: None,
            input_mode: InputMode::Normal,
            source,
            next_seq: 0,
            latest: HashMap::new(),
            in_flight: HashSet::new(),
            source_error: None,
            aws: None,
            monitor: MonitorState::new(config.query_page_size),
            plans: PlansState::new(config.plan_page_size),
            cloudwatch: CloudWatchState::new(config.digest_page_size),
            statistics: StatisticsState::new(today),
            instances: InstancesState::default(),
            status_ticker: Ticker::new(config.status_refresh),
            query_ticker,
            filter_text: String::new(),
            theme,
            banners: Vec::new(),
            status_message: None,
            clipboard: None,
            config,
        }
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    // ----- Banners -----

    fn set_banner(&mut self, slot: Slot, message: String) {
        self.banners.retain(|(s, _)| *s != slot);
        self.banners.push((slot, message));
    }

    fn clear_banner(&mut self, slot: Slot) {
        self.banners.retain(|(s, _)| *s != slot);
    }

    fn fail(&mut self, slot: Slot, error: &ApiError) {
        warn!(slot = ?slot, error = %error, "Request failed");
        self.set_banner(slot, format!("{}: {}", slot.label(), error.banner()));
    }

    /// The most recent error banner, with the number of others behind it.
    pub fn current_banner(&self) -> Option<(&str, usize)> {
        self.banners
            .last()
            .map(|(_, msg)| (msg.as_str(), self.banners.len() - 1))
    }

    pub fn dismiss_banners(&mut self) {
        self.banners.clear();
    }

    // ----- Requests and replies -----

    /// Submit a request, superseding any earlier one of the same slot.
    pub fn request(&mut self, request: Request) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        let slot = request.slot();
        self.latest.insert(slot, seq);
        self.in_flight.insert(slot);
        debug!(seq, slot = ?slot, "Submitting request");
        self.source.submit(seq, request);
        seq
    }

    /// Sequence number of the latest request of `slot`.
    pub fn latest_seq(&self, slot: Slot) -> Option<u64> {
        self.latest.get(&slot).copied()
    }

    /// Whether a request of `slot` is waiting for its reply.
    pub fn is_loading(&self, slot: Slot) -> bool {
        self.in_flight.contains(&slot)
    }

    /// Apply every reply the source has ready. Returns how many were applied.
    pub fn poll_replies(&mut self) -> usize {
        self.source_error = self.source.error().map(str::to_string);

        let mut applied = 0;
        while let Some(reply) = self.source.poll() {
            if self.apply_reply(reply) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one reply. Replies to superseded requests are dropped.
    pub fn apply_reply(&mut self, reply: Reply) -> bool {
        let slot = reply.update.slot();
        if let Some(seq) = reply.seq {
            if self.latest.get(&slot) != Some(&seq) {
                debug!(seq, slot = ?slot, "Dropping stale reply");
                return false;
            }
            self.in_flight.remove(&slot);
        }

        match reply.update {
            Update::AwsInfo(result) => match result {
                Ok(info) => {
                    self.clear_banner(slot);
                    self.aws = Some(info);
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::MonitorStatus(result) => match result {
                Ok(status) => {
                    self.clear_banner(slot);
                    let was_running = self.monitor.is_running();
                    self.monitor.status = Some(status);
                    if self.monitor.is_running() {
                        self.query_ticker.resume();
                        if !was_running && self.monitor.loaded {
                            self.fetch_queries();
                        }
                    } else {
                        self.query_ticker.pause();
                    }
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::MonitorAction { start, result } => match result {
                Ok(response) => {
                    self.clear_banner(slot);
                    info!(start, status = %response.status, "Monitor action completed");
                    let verb = if start { "started" } else { "stopped" };
                    self.set_status_message(format!("Monitoring {}", verb));
                    self.request(Request::MonitorStatus);
                    self.status_ticker.reset();
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::SlowQueries { instance, result } => match result {
                Ok(page) => {
                    self.clear_banner(slot);
                    if instance.is_none() {
                        self.monitor.instances =
                            sorted_instances(page.items.iter().map(|q| q.instance.as_str()));
                    }
                    self.monitor.pager.set_total(page.total);
                    self.monitor.queries = page.items;
                    self.monitor.loaded = true;
                    let len = self.visible_queries().len();
                    clamp_selection(&mut self.monitor.selected, len);
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::ExplainCollected(result) => match result {
                Ok(response) => {
                    self.clear_banner(slot);
                    info!(pid = response.pid, instance = %response.instance_name, "Explain collected");
                    self.monitor.explain = Some(response);
                    self.monitor.explain_saved_at = Some(Instant::now());
                    // A new plan exists; refetch the plan list on next visit.
                    self.plans.loaded = false;
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::Explain(result) => match result {
                Ok(plan) => {
                    self.clear_banner(slot);
                    self.overlay = Some(Overlay::Plan(Box::new(PlanOverlay::new(plan))));
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::MarkdownSaved(result) => match result {
                Ok(path) => {
                    self.clear_banner(slot);
                    self.set_status_message(format!("Saved {}", path.display()));
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::ExplainPlans { instance, result } => match result {
                Ok(page) => {
                    self.clear_banner(slot);
                    if instance.is_none() {
                        self.plans.instances =
                            sorted_instances(page.items.iter().map(|p| p.instance.as_str()));
                    }
                    self.plans.pager.set_total(page.total);
                    self.plans.plans = page.items;
                    self.plans.loaded = true;
                    let len = self.visible_plans().len();
                    clamp_selection(&mut self.plans.selected, len);
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::CollectionStarted(result) => match result {
                Ok(response) => {
                    self.clear_banner(slot);
                    match response.collection_id.clone() {
                        Some(id) => {
                            info!(collection_id = %id, "Collection started");
                            self.cloudwatch.start_watch(id.clone());
                            self.request(Request::WatchCollection { collection_id: id });
                        }
                        None => {
                            self.cloudwatch.job_status = Some(response.status.clone());
                        }
                    }
                    self.set_status_message(format!("Collection {}", response.status));
                    self.cloudwatch.response = Some(response);
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::CollectionStatus(result) => match result {
                Ok(response) => {
                    self.clear_banner(slot);
                    self.cloudwatch.job_status = Some(response.status.clone());
                    self.cloudwatch.response = Some(response);
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::Watch {
                collection_id,
                event,
            } => {
                if self.cloudwatch.collection_id.as_deref() != Some(collection_id.as_str()) {
                    debug!(collection_id = %collection_id, "Dropping event of a replaced stream");
                    return false;
                }
                self.apply_watch_event(event);
            }
            Update::Digest(result) => match result {
                Ok(digest) => {
                    self.clear_banner(slot);
                    self.cloudwatch.digest_month = digest.month;
                    self.cloudwatch.digest = digest.stats;
                    self.cloudwatch.loaded = true;
                    self.sync_digest_pager();
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::RdsCollected(result) => match result {
                Ok(response) if response.is_success() => {
                    self.clear_banner(slot);
                    self.set_status_message(format!(
                        "Collected {} instances",
                        response.collected_count
                    ));
                    self.instances.collect = Some(response);
                    self.request(Request::RdsInstances);
                }
                Ok(response) => {
                    let message = format!("{}: {}", slot.label(), response.message);
                    self.set_banner(slot, message);
                    self.instances.collect = Some(response);
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::RdsInstances(result) => match result {
                Ok(instances) => {
                    self.clear_banner(slot);
                    self.instances.instances = instances;
                    self.instances.loaded = true;
                    let len = self.visible_instances().len();
                    clamp_selection(&mut self.instances.selected, len);
                }
                Err(e) => self.fail(slot, &e),
            },
            Update::Statistics(bundle) => {
                if bundle.month != Some(self.statistics.month) {
                    return false;
                }
                if bundle.failures.is_empty() {
                    self.clear_banner(slot);
                } else {
                    let message = format!("{}: {}", slot.label(), bundle.failures.join("; "));
                    self.set_banner(slot, message);
                }
                self.statistics.set_bundle(bundle);
            }
            Update::StatisticsCalculated { month, result } => match result {
                Ok(response) => {
                    self.clear_banner(slot);
                    let message = if response.message.is_empty() {
                        format!("Statistics for {} calculated", month)
                    } else {
                        response.message
                    };
                    self.set_status_message(message);
                    if month == self.statistics.month {
                        self.fetch_statistics();
                    }
                }
                Err(e) => self.fail(slot, &e),
            },
        }
        true
    }

    fn apply_watch_event(&mut self, event: WatchEvent) {
        let state = &mut self.cloudwatch;
        match event {
            WatchEvent::Connected { attempt } => {
                if attempt > 0 {
                    state.push_log("info", "Reconnected", None);
                }
                state.stream = StreamState::Connected;
            }
            WatchEvent::Event(event) => {
                if let CollectionEvent::Status { status, .. } = &event {
                    debug!(status = %status, "Collection status");
                }
                state.apply_event(event);
            }
            WatchEvent::Reconnecting { attempt, max } => {
                state.push_log(
                    "warn",
                    format!("Connection lost, reconnecting ({}/{})", attempt, max),
                    None,
                );
                state.stream = StreamState::Reconnecting { attempt, max };
            }
            WatchEvent::Finished => {
                state.stream = StreamState::Finished;
                self.in_flight.remove(&Slot::Watch);
                self.set_status_message("Collection finished".to_string());
                self.request(Request::DigestStats);
            }
            WatchEvent::Failed(message) => {
                state.stream = StreamState::Failed(message.clone());
                self.in_flight.remove(&Slot::Watch);
                self.set_banner(Slot::Watch, format!("{}: {}", Slot::Watch.label(), message));
            }
        }
    }

    /// Poll replies and fire due timers. Called on every loop iteration.
    pub fn tick(&mut self) {
        self.poll_replies();

        if self.status_ticker.due() {
            self.request(Request::MonitorStatus);
        }
        if self.query_ticker.due() && self.monitor.is_running() {
            self.fetch_queries();
        }
    }

    /// Initial requests: identity, monitor status and the current view.
    pub fn start(&mut self) {
        self.request(Request::AwsInfo);
        self.request(Request::MonitorStatus);
        self.ensure_loaded(self.current_view);
    }

    fn fetch_queries(&mut self) {
        self.query_ticker.reset();
        self.request(Request::SlowQueries {
            page: self.monitor.pager.page(),
            page_size: self.monitor.pager.page_size(),
            instance: self.monitor.instance_filter.clone(),
        });
    }

    fn fetch_plans(&mut self) {
        self.request(Request::ExplainPlans {
            page: self.plans.pager.page(),
            page_size: self.plans.pager.page_size(),
            instance: self.plans.instance_filter.clone(),
        });
    }

    fn fetch_statistics(&mut self) {
        self.request(Request::Statistics {
            month: self.statistics.month,
        });
    }

    /// Load a view's data unless it is loaded or loading.
    fn ensure_loaded(&mut self, view: View) {
        let (loaded, slot) = match view {
            View::Monitor => (self.monitor.loaded, Slot::SlowQueries),
            View::Plans => (self.plans.loaded, Slot::Plans),
            View::CloudWatch => (self.cloudwatch.loaded, Slot::Digest),
            View::Statistics => (self.statistics.loaded, Slot::Statistics),
            View::Instances => (self.instances.loaded, Slot::RdsInstances),
        };
        if !loaded && !self.is_loading(slot) {
            self.reload_view(view);
        }
    }

    fn reload_view(&mut self, view: View) {
        match view {
            View::Monitor => {
                self.request(Request::MonitorStatus);
                self.status_ticker.reset();
                self.fetch_queries();
            }
            View::Plans => self.fetch_plans(),
            View::CloudWatch => {
                self.request(Request::DigestStats);
                if let Some(date) = self.cloudwatch.target_date {
                    self.request(Request::CollectionStatus { date });
                }
            }
            View::Statistics => self.fetch_statistics(),
            View::Instances => {
                self.request(Request::RdsInstances);
            }
        }
    }

    /// Reload the current view.
    pub fn reload(&mut self) {
        self.reload_view(self.current_view);
    }

    // ----- View navigation -----

    /// Push current view to stack and navigate to a new view.
    pub fn push_view(&mut self, view: View) {
        if view == self.current_view {
            return;
        }
        self.view_stack.push(self.current_view);
        self.set_view(view);
    }

    /// Pop the view stack and restore the previous view.
    pub fn pop_view(&mut self) -> bool {
        if let Some(view) = self.view_stack.pop() {
            self.set_view(view);
            true
        } else {
            false
        }
    }

    /// Get breadcrumb trail for current navigation.
    pub fn breadcrumb(&self) -> String {
        let mut parts: Vec<&str> = self.view_stack.iter().map(|v| v.label()).collect();
        parts.push(self.current_view.label());
        parts.join(" > ")
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.set_view(self.current_view.next());
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.set_view(self.current_view.prev());
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
        self.filter_text.clear();
        if self.input_mode != InputMode::Normal {
            self.input_mode = InputMode::Normal;
        }
        self.ensure_loaded(view);
        self.sync_digest_pager();
    }

    // ----- Rows and selection -----

    /// Check if a name matches the current filter.
    pub fn matches_filter(&self, name: &str) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        name.to_lowercase().contains(&self.filter_text.to_lowercase())
    }

    fn matches_any(&self, fields: &[&str]) -> bool {
        fields.iter().any(|f| self.matches_filter(f))
    }

    /// Slow queries of the current page after the text filter.
    pub fn visible_queries(&self) -> Vec<&SlowQuery> {
        self.monitor
            .queries
            .iter()
            .filter(|q| self.matches_any(&[&q.sql_text, &q.instance, &q.user, &q.db]))
            .collect()
    }

    /// Plans of the current page after the text filter.
    pub fn visible_plans(&self) -> Vec<&ExplainPlan> {
        self.plans
            .plans
            .iter()
            .filter(|p| self.matches_any(&[&p.sql_text, &p.instance]))
            .collect()
    }

    /// Digest rows after the text filter, all pages.
    pub fn visible_digest(&self) -> Vec<&QueryStat> {
        self.cloudwatch
            .digest
            .iter()
            .filter(|s| self.matches_any(&[&s.digest_query, &s.instance_id, &s.user]))
            .collect()
    }

    /// Digest rows of the current digest page.
    pub fn digest_page(&self) -> Vec<&QueryStat> {
        let visible = self.visible_digest();
        self.cloudwatch.digest_pager.slice(&visible).to_vec()
    }

    pub fn visible_instances(&self) -> Vec<&RdsInstance> {
        self.instances
            .instances
            .iter()
            .filter(|i| self.matches_any(&[&i.identifier, &i.engine, &i.status]))
            .collect()
    }

    fn sync_digest_pager(&mut self) {
        let total = self.visible_digest().len() as u64;
        self.cloudwatch.digest_pager.set_total(total);
        let len = self.digest_page().len();
        clamp_selection(&mut self.cloudwatch.selected, len);
    }

    /// Number of selectable rows in the current view.
    pub fn row_count(&self) -> usize {
        match self.current_view {
            View::Monitor => self.visible_queries().len(),
            View::Plans => self.visible_plans().len(),
            View::CloudWatch => self.digest_page().len(),
            View::Statistics => self.statistics.visible_rows(),
            View::Instances => self.visible_instances().len(),
        }
    }

    fn selection_mut(&mut self) -> &mut usize {
        match self.current_view {
            View::Monitor => &mut self.monitor.selected,
            View::Plans => &mut self.plans.selected,
            View::CloudWatch => &mut self.cloudwatch.selected,
            View::Statistics => &mut self.statistics.selected,
            View::Instances => &mut self.instances.selected,
        }
    }

    /// Selected row of the current view.
    pub fn selected_index(&self) -> usize {
        match self.current_view {
            View::Monitor => self.monitor.selected,
            View::Plans => self.plans.selected,
            View::CloudWatch => self.cloudwatch.selected,
            View::Statistics => self.statistics.selected,
            View::Instances => self.instances.selected,
        }
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        let max = self.row_count().saturating_sub(1);
        let selected = self.selection_mut();
        *selected = (*selected + n).min(max);
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        let selected = self.selection_mut();
        *selected = selected.saturating_sub(n);
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        *self.selection_mut() = 0;
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        let last = self.row_count().saturating_sub(1);
        *self.selection_mut() = last;
    }

    /// Select a row by its visual position, ignoring rows past the end.
    pub fn select_row(&mut self, row: usize) {
        if row < self.row_count() {
            *self.selection_mut() = row;
        }
    }

    // ----- Pagination -----

    fn turn_page(&mut self, turn: impl FnOnce(&mut crate::data::Pager) -> bool) {
        match self.current_view {
            View::Monitor => {
                if turn(&mut self.monitor.pager) {
                    self.monitor.selected = 0;
                    self.fetch_queries();
                }
            }
            View::Plans => {
                if turn(&mut self.plans.pager) {
                    self.plans.selected = 0;
                    self.fetch_plans();
                }
            }
            View::CloudWatch => {
                if turn(&mut self.cloudwatch.digest_pager) {
                    self.cloudwatch.selected = 0;
                }
            }
            View::Statistics | View::Instances => {}
        }
    }

    pub fn page_next(&mut self) {
        self.turn_page(|p| p.next());
    }

    pub fn page_prev(&mut self) {
        self.turn_page(|p| p.prev());
    }

    pub fn page_first(&mut self) {
        self.turn_page(|p| p.first());
    }

    pub fn page_last(&mut self) {
        self.turn_page(|p| p.last());
    }

    // ----- Overlays -----

    /// Open the detail overlay for the selected row.
    pub fn enter_detail(&mut self) {
        let overlay = match self.current_view {
            View::Monitor => {
                let Some(query) = self.visible_queries().get(self.monitor.selected).copied()
                else {
                    return;
                };
                let pid = query.pid;
                let title = format!("PID {} on {}", pid, query.instance);
                let overlay = SqlOverlay::new(title, &query.sql_text);
                self.monitor.pid_input = pid.to_string();
                Overlay::Sql(overlay)
            }
            View::Plans => {
                let Some(plan) = self.visible_plans().get(self.plans.selected).copied() else {
                    return;
                };
                Overlay::Plan(Box::new(PlanOverlay::new(plan.clone())))
            }
            View::CloudWatch => {
                let Some(stat) = self.digest_page().get(self.cloudwatch.selected).copied() else {
                    return;
                };
                let title = format!("Digest on {}", stat.instance_id);
                Overlay::Sql(SqlOverlay::new(title, &stat.digest_query))
            }
            View::Statistics | View::Instances => return,
        };
        self.overlay = Some(overlay);
    }

    /// Close the overlay if open.
    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    /// Navigate back: close the overlay, then dismiss banners, then pop the
    /// view stack, then go to Monitor.
    pub fn go_back(&mut self) {
        if self.overlay.is_some() {
            self.overlay = None;
            return;
        }
        if !self.banners.is_empty() {
            self.dismiss_banners();
            return;
        }
        if !self.pop_view() && self.current_view != View::Monitor {
            self.set_view(View::Monitor);
        }
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    // ----- Pickers -----

    /// Open the instance filter of the current view (or focused panel).
    pub fn open_instance_filter(&mut self) {
        let picker = match self.current_view {
            View::Monitor => single_instance_picker(
                PickerTarget::MonitorInstance,
                &self.monitor.instances,
                self.monitor.instance_filter.as_deref(),
            ),
            View::Plans => single_instance_picker(
                PickerTarget::PlansInstance,
                &self.plans.instances,
                self.plans.instance_filter.as_deref(),
            ),
            View::Statistics => {
                let panel = self.statistics.panel;
                let options = self.statistics.instances_for(panel);
                if options.is_empty() {
                    self.set_status_message("No instances to filter".to_string());
                    return;
                }
                Picker::new(PickerTarget::StatsInstances(panel), options, 0)
            }
            View::CloudWatch | View::Instances => return,
        };
        self.overlay = Some(Overlay::Picker(picker));
    }

    /// Open the chart metric picker.
    pub fn open_metric_picker(&mut self) {
        if self.current_view == View::Statistics {
            let picker = Picker::new(PickerTarget::Metrics, metric_options(), 0);
            self.overlay = Some(Overlay::Picker(picker));
        }
    }

    /// Open the statistics month picker.
    pub fn open_month_picker(&mut self) {
        if self.current_view != View::Statistics {
            return;
        }
        let options = self.statistics.picker.iter().map(|m| m.label()).collect();
        let cursor = self
            .statistics
            .picker
            .iter()
            .position(|m| *m == self.statistics.month)
            .unwrap_or(0);
        let picker = Picker::new(PickerTarget::Month, options, cursor);
        self.overlay = Some(Overlay::Picker(picker));
    }

    /// Whether option `index` of `picker` is currently in effect.
    pub fn picker_checked(&self, picker: &Picker, index: usize) -> bool {
        let option = picker.options.get(index).map(String::as_str);
        match picker.target {
            PickerTarget::MonitorInstance => {
                single_checked(index, option, self.monitor.instance_filter.as_deref())
            }
            PickerTarget::PlansInstance => {
                single_checked(index, option, self.plans.instance_filter.as_deref())
            }
            PickerTarget::StatsInstances(panel) => {
                option.is_some_and(|id| self.statistics.selection(panel).contains(id))
            }
            PickerTarget::Metrics => Metric::ALL
                .get(index)
                .is_some_and(|m| self.statistics.metrics.contains(*m)),
            PickerTarget::Month => self.statistics.picker.get(index) == Some(&self.statistics.month),
        }
    }

    fn picker(&self) -> Option<&Picker> {
        match &self.overlay {
            Some(Overlay::Picker(picker)) => Some(picker),
            _ => None,
        }
    }

    /// Apply the option under the cursor. Single-select pickers close.
    pub fn picker_select(&mut self) {
        let Some(picker) = self.picker().cloned() else {
            return;
        };
        if picker.target.is_multi() {
            self.picker_toggle();
            return;
        }
        let index = picker.cursor;
        let option = picker.current().map(str::to_string);
        self.overlay = None;

        match picker.target {
            PickerTarget::MonitorInstance => {
                let filter = if index == 0 { None } else { option };
                if filter != self.monitor.instance_filter {
                    self.monitor.instance_filter = filter;
                    self.monitor.pager.reset();
                    self.monitor.selected = 0;
                    self.fetch_queries();
                }
            }
            PickerTarget::PlansInstance => {
                let filter = if index == 0 { None } else { option };
                if filter != self.plans.instance_filter {
                    self.plans.instance_filter = filter;
                    self.plans.pager.reset();
                    self.plans.selected = 0;
                    self.fetch_plans();
                }
            }
            PickerTarget::Month => {
                if let Some(month) = self.statistics.picker.get(index).copied() {
                    self.select_month(month);
                }
            }
            PickerTarget::StatsInstances(_) | PickerTarget::Metrics => {}
        }
    }

    /// Toggle the option under the cursor of a multi-select picker.
    pub fn picker_toggle(&mut self) {
        let Some(picker) = self.picker().cloned() else {
            return;
        };
        match picker.target {
            PickerTarget::StatsInstances(panel) => {
                if let Some(id) = picker.current() {
                    self.statistics.selection_mut(panel).toggle(id);
                    let len = self.statistics.visible_rows();
                    clamp_selection(&mut self.statistics.selected, len);
                }
            }
            PickerTarget::Metrics => {
                if let Some(metric) = Metric::ALL.get(picker.cursor) {
                    self.statistics.metrics.toggle(*metric);
                }
            }
            _ => self.picker_select(),
        }
    }

    /// Select every instance, or none when all are selected.
    pub fn picker_toggle_all(&mut self) {
        let Some(picker) = self.picker().cloned() else {
            return;
        };
        if let PickerTarget::StatsInstances(panel) = picker.target {
            self.statistics
                .selection_mut(panel)
                .toggle_all(&picker.options);
            let len = self.statistics.visible_rows();
            clamp_selection(&mut self.statistics.selected, len);
        }
    }

    // ----- Statistics -----

    /// Switch the statistics month and fetch it.
    pub fn select_month(&mut self, month: crate::data::YearMonth) {
        if month != self.statistics.month {
            info!(month = %month, "Statistics month selected");
            self.statistics.month = month;
            self.fetch_statistics();
        }
    }

    /// Step to the next month of the picker, wrapping around.
    pub fn cycle_month(&mut self) {
        let picker = &self.statistics.picker;
        if picker.is_empty() {
            return;
        }
        let next = picker
            .iter()
            .position(|m| *m == self.statistics.month)
            .map(|i| (i + 1) % picker.len())
            .unwrap_or(0);
        let month = picker[next];
        self.select_month(month);
    }

    pub fn toggle_compare(&mut self) {
        self.statistics.compare = !self.statistics.compare;
    }

    pub fn cycle_stats_panel(&mut self) {
        self.statistics.panel = self.statistics.panel.next();
        self.statistics.selected = 0;
    }

    /// Ask the backend to (re)compute statistics of the selected month.
    pub fn calculate_statistics(&mut self) {
        if self.is_loading(Slot::Calculate) {
            return;
        }
        let month = self.statistics.month;
        self.set_status_message(format!("Calculating statistics for {}", month));
        self.request(Request::CalculateStatistics { month });
    }

    // ----- Monitor actions -----

    /// Start is offered while the scraper is not running.
    pub fn can_start_monitor(&self) -> bool {
        !self.monitor.is_running() && !self.is_loading(Slot::MonitorAction)
    }

    /// Stop is offered while the scraper is running.
    pub fn can_stop_monitor(&self) -> bool {
        self.monitor.is_running() && !self.is_loading(Slot::MonitorAction)
    }

    pub fn start_monitor(&mut self) {
        if self.can_start_monitor() {
            self.request(Request::StartMonitor);
        } else {
            self.set_status_message("Monitoring is already running".to_string());
        }
    }

    pub fn stop_monitor(&mut self) {
        if self.can_stop_monitor() {
            self.request(Request::StopMonitor);
        } else {
            self.set_status_message("Monitoring is not running".to_string());
        }
    }

    fn require_pid(&mut self) -> Option<i64> {
        let pid = self.monitor.pid();
        if pid.is_none() {
            self.set_status_message("Enter a PID first (p)".to_string());
        }
        pid
    }

    /// Capture the EXPLAIN plan of the entered PID.
    pub fn collect_explain(&mut self) {
        if self.is_loading(Slot::CollectExplain) {
            return;
        }
        if let Some(pid) = self.require_pid() {
            self.request(Request::CollectExplain { pid });
        }
    }

    /// Show the stored EXPLAIN plan of the entered PID.
    pub fn view_explain(&mut self) {
        if let Some(pid) = self.require_pid() {
            self.request(Request::Explain { pid });
        }
    }

    /// Save the markdown EXPLAIN report of the entered PID.
    pub fn download_markdown(&mut self) {
        if self.is_loading(Slot::Markdown) {
            return;
        }
        if let Some(pid) = self.require_pid() {
            let dir = self.config.download_dir.clone();
            self.request(Request::ExplainMarkdown { pid, dir });
        }
    }

    // ----- CloudWatch actions -----

    pub fn start_collection(&mut self) {
        if self.is_loading(Slot::Collection) {
            return;
        }
        self.request(Request::RunCollection {
            target_date: self.cloudwatch.target_date,
        });
    }

    pub fn check_collection_status(&mut self) {
        match self.cloudwatch.target_date {
            Some(date) => {
                self.request(Request::CollectionStatus { date });
            }
            None => self.set_status_message("Enter a target date first (d)".to_string()),
        }
    }

    /// Stop following the progress stream.
    pub fn stop_watch(&mut self) {
        if self.cloudwatch.stream.is_active() {
            self.request(Request::StopWatch);
            self.in_flight.remove(&Slot::Watch);
            self.cloudwatch.collection_id = None;
            self.cloudwatch.stream = StreamState::Idle;
            self.set_status_message("Stopped following collection".to_string());
        }
    }

    // ----- Instances actions -----

    pub fn collect_rds_instances(&mut self) {
        if self.is_loading(Slot::RdsCollect) {
            return;
        }
        self.request(Request::CollectRdsInstances);
    }

    // ----- Text input -----

    /// Enter filter input mode (starts capturing keystrokes for search).
    pub fn start_filter(&mut self) {
        if self.current_view == View::Statistics {
            self.set_status_message("Use i to filter statistics by instance".to_string());
            return;
        }
        self.input_mode = InputMode::Filter;
    }

    /// Exit filter input mode without clearing the filter text.
    pub fn cancel_filter(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    /// Clear the filter text and exit filter mode.
    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.input_mode = InputMode::Normal;
        self.after_filter_change();
    }

    /// Append a character to the filter text.
    pub fn filter_push(&mut self, c: char) {
        self.filter_text.push(c);
        self.after_filter_change();
    }

    /// Remove the last character from the filter text.
    pub fn filter_pop(&mut self) {
        self.filter_text.pop();
        self.after_filter_change();
    }

    pub fn filter_active(&self) -> bool {
        self.input_mode == InputMode::Filter
    }

    fn after_filter_change(&mut self) {
        if self.current_view == View::CloudWatch {
            self.cloudwatch.digest_pager.reset();
            self.sync_digest_pager();
        }
        let len = self.row_count();
        clamp_selection(self.selection_mut(), len);
    }

    pub fn start_pid_input(&mut self) {
        if self.current_view == View::Monitor {
            self.input_mode = InputMode::Pid;
        }
    }

    pub fn start_date_input(&mut self) {
        if self.current_view == View::CloudWatch {
            self.input_mode = InputMode::Date;
        }
    }

    /// Type into the PID or date field. Characters the field does not
    /// accept are ignored.
    pub fn input_push(&mut self, c: char) {
        match self.input_mode {
            InputMode::Pid => {
                if c.is_ascii_digit() && self.monitor.pid_input.len() < MAX_PID_DIGITS {
                    self.monitor.pid_input.push(c);
                }
            }
            InputMode::Date => {
                if (c.is_ascii_digit() || c == '-') && self.cloudwatch.date_input.len() < DATE_LEN {
                    self.cloudwatch.date_input.push(c);
                }
            }
            InputMode::Filter => self.filter_push(c),
            InputMode::Normal => {}
        }
    }

    pub fn input_pop(&mut self) {
        match self.input_mode {
            InputMode::Pid => {
                self.monitor.pid_input.pop();
            }
            InputMode::Date => {
                self.cloudwatch.date_input.pop();
            }
            InputMode::Filter => self.filter_pop(),
            InputMode::Normal => {}
        }
    }

    /// Finish editing. An invalid date keeps the field open.
    pub fn input_confirm(&mut self) {
        if self.input_mode == InputMode::Date {
            let text = self.cloudwatch.date_input.trim();
            if text.is_empty() {
                self.cloudwatch.target_date = None;
            } else {
                match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                    Ok(date) => self.cloudwatch.target_date = Some(date),
                    Err(_) => {
                        self.set_status_message("Invalid date, use YYYY-MM-DD".to_string());
                        return;
                    }
                }
            }
        }
        self.input_mode = InputMode::Normal;
    }

    pub fn input_cancel(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    // ----- Clipboard -----

    /// Copy the SQL of the overlay or the selected row.
    pub fn copy_sql(&mut self) {
        let text = if let Some(text) = self.overlay.as_ref().and_then(Overlay::copy_text) {
            Some(text.to_string())
        } else {
            match self.current_view {
                View::Monitor => self
                    .visible_queries()
                    .get(self.monitor.selected)
                    .map(|q| q.sql_text.clone()),
                View::Plans => self
                    .visible_plans()
                    .get(self.plans.selected)
                    .map(|p| p.sql_text.clone()),
                View::CloudWatch => self
                    .digest_page()
                    .get(self.cloudwatch.selected)
                    .map(|s| s.digest_query.clone()),
                View::Statistics | View::Instances => None,
            }
        };

        match text {
            Some(text) => {
                self.clipboard = Some(text);
                self.set_status_message("Copied SQL to clipboard".to_string());
            }
            None => self.set_status_message("Nothing to copy".to_string()),
        }
    }

    /// Text to hand to the terminal clipboard, if any.
    pub fn take_clipboard(&mut self) -> Option<String> {
        self.clipboard.take()
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the current view's data to a JSON file.
    pub fn export_state(&self, path: &std::path::Path) -> Result<()> {
        use std::io::Write;

        let data = match self.current_view {
            View::Monitor => {
                if !self.monitor.loaded {
                    anyhow::bail!("No data to export");
                }
                json!({
                    "status": self.monitor.status,
                    "page": self.monitor.pager.page(),
                    "total": self.monitor.pager.total(),
                    "instance": self.monitor.instance_filter,
                    "queries": self.visible_queries(),
                })
            }
            View::Plans => {
                if !self.plans.loaded {
                    anyhow::bail!("No data to export");
                }
                json!({
                    "page": self.plans.pager.page(),
                    "total": self.plans.pager.total(),
                    "instance": self.plans.instance_filter,
                    "plans": self.visible_plans(),
                })
            }
            View::CloudWatch => {
                if !self.cloudwatch.loaded && self.cloudwatch.response.is_none() {
                    anyhow::bail!("No data to export");
                }
                json!({
                    "collection": self.cloudwatch.response,
                    "collection_id": self.cloudwatch.collection_id,
                    "job_status": self.cloudwatch.job_status,
                    "log": self.cloudwatch.log,
                    "digest_month": self.cloudwatch.digest_month,
                    "digest": self.visible_digest(),
                })
            }
            View::Statistics => {
                if !self.statistics.loaded {
                    anyhow::bail!("No data to export");
                }
                let bundle = &self.statistics.bundle;
                json!({
                    "month": self.statistics.month,
                    "previous_month": self.statistics.month.prev(),
                    "sql": bundle.sql,
                    "users": bundle.users,
                    "previous_sql": bundle.prev_sql,
                    "previous_users": bundle.prev_users,
                    "failures": bundle.failures,
                })
            }
            View::Instances => {
                if !self.instances.loaded {
                    anyhow::bail!("No data to export");
                }
                json!({
                    "last_update": latest_update(&self.instances.instances),
                    "real_time_count": real_time_count(&self.instances.instances),
                    "instances": self.visible_instances(),
                })
            }
        };

        let export = json!({
            "view": self.current_view.label(),
            "exported_at": Utc::now().to_rfc3339(),
            "aws": self.aws,
            "data": data,
        });

        let json = serde_json::to_string_pretty(&export)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(json.as_bytes())?;

        info!(path = %path.display(), view = self.current_view.label(), "Exported view");
        Ok(())
    }
}

/// Single-select instance picker with "All instances" first.
fn single_instance_picker(
    target: PickerTarget,
    instances: &[String],
    current: Option<&str>,
) -> Picker {
    let mut options = vec!["All instances".to_string()];
    options.extend(instances.iter().cloned());
    let cursor = current
        .and_then(|c| instances.iter().position(|i| i == c))
        .map(|i| i + 1)
        .unwrap_or(0);
    Picker::new(target, options, cursor)
}

fn single_checked(index: usize, option: Option<&str>, current: Option<&str>) -> bool {
    match current {
        None => index == 0,
        Some(current) => index > 0 && option == Some(current),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::api::{
        CollectRdsResponse, CollectionResponse, DigestResponse, ExplainResponse, MonitorResponse,
        Page, SqlStatistics,
    };
    use crate::data::{StatisticsBundle, YearMonth};
    use crate::source::ChannelSource;
    use tokio::sync::mpsc::UnboundedSender;

    type Log = Arc<Mutex<Vec<(u64, Request)>>>;

    /// A channel source that also records what was submitted.
    #[derive(Debug)]
    struct Recording {
        inner: ChannelSource,
        log: Log,
    }

    impl DataSource for Recording {
        fn submit(&mut self, seq: u64, request: Request) {
            self.log.lock().unwrap().push((seq, request.clone()));
            self.inner.submit(seq, request);
        }

        fn poll(&mut self) -> Option<Reply> {
            self.inner.poll()
        }

        fn description(&self) -> &str {
            self.inner.description()
        }

        fn error(&self) -> Option<&str> {
            self.inner.error()
        }
    }

    fn test_app() -> (App, UnboundedSender<Reply>, Log) {
        test_app_with(AppConfig::default())
    }

    fn test_app_with(config: AppConfig) -> (App, UnboundedSender<Reply>, Log) {
        let (tx, inner) = ChannelSource::create("test");
        let log = Log::default();
        let source = Recording {
            inner,
            log: log.clone(),
        };
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let app = App::with_theme(Box::new(source), config, Theme::dark(), today);
        (app, tx, log)
    }

    fn requests(log: &Log) -> Vec<Request> {
        log.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    fn query(pid: i64, instance: &str, sql: &str) -> SlowQuery {
        SlowQuery {
            pid,
            instance: instance.to_string(),
            db: "orders".to_string(),
            user: "app".to_string(),
            host: "10.0.0.1".to_string(),
            time: 12.5,
            sql_text: sql.to_string(),
            start: "2025-02-01T10:00:00".to_string(),
            end: None,
        }
    }

    fn page<T>(items: Vec<T>, total: u64) -> Page<T> {
        Page {
            total,
            page: 1,
            page_size: 20,
            items,
        }
    }

    fn monitor_status(status: &str) -> MonitorResponse {
        MonitorResponse {
            status: status.to_string(),
            message: String::new(),
            timestamp: String::new(),
        }
    }

    fn answer(app: &App, update: Update) -> Reply {
        let seq = app.latest_seq(update.slot()).unwrap();
        Reply::answer(seq, update)
    }

    #[test]
    fn test_view_cycle() {
        let mut view = View::Monitor;
        for _ in 0..View::ALL.len() {
            view = view.next();
        }
        assert_eq!(view, View::Monitor);
        assert_eq!(View::Monitor.prev(), View::Instances);
        assert_eq!(View::Statistics.index(), 3);
    }

    #[test]
    fn test_start_requests_identity_status_and_queries() {
        let (mut app, _tx, log) = test_app();
        app.start();

        let submitted = requests(&log);
        assert_eq!(submitted[0], Request::AwsInfo);
        assert!(submitted.contains(&Request::MonitorStatus));
        assert!(submitted.contains(&Request::SlowQueries {
            page: 1,
            page_size: 20,
            instance: None,
        }));
    }

    #[test]
    fn test_query_list_polls_only_while_running() {
        let (mut app, _tx, log) = test_app_with(AppConfig {
            status_refresh: Duration::from_secs(3600),
            query_refresh: Duration::from_millis(20),
            ..AppConfig::default()
        });
        let query_fetches = |log: &Log| {
            requests(log)
                .iter()
                .filter(|r| matches!(r, Request::SlowQueries { .. }))
                .count()
        };
        let wait = || std::thread::sleep(Duration::from_millis(40));

        app.start();
        app.apply_reply(answer(
            &app,
            Update::SlowQueries {
                instance: None,
                result: Ok(page(vec![query(1, "a", "select 1")], 1)),
            },
        ));
        app.apply_reply(answer(&app, Update::MonitorStatus(Ok(monitor_status("stopped")))));
        let initial = query_fetches(&log);
        assert_eq!(initial, 1);

        // Stopped: the timer never fires.
        wait();
        app.tick();
        assert_eq!(query_fetches(&log), initial);

        // Stopped to running refetches at once.
        app.request(Request::MonitorStatus);
        app.apply_reply(answer(&app, Update::MonitorStatus(Ok(monitor_status("running")))));
        assert_eq!(query_fetches(&log), initial + 1);
        app.tick();
        assert_eq!(query_fetches(&log), initial + 1);

        // Running: one fetch per period.
        wait();
        app.tick();
        assert_eq!(query_fetches(&log), initial + 2);

        // Still running: no second immediate fetch.
        app.request(Request::MonitorStatus);
        app.apply_reply(answer(&app, Update::MonitorStatus(Ok(monitor_status("running")))));
        assert_eq!(query_fetches(&log), initial + 2);

        // Stopped again: polling ends.
        app.request(Request::MonitorStatus);
        app.apply_reply(answer(&app, Update::MonitorStatus(Ok(monitor_status("stopped")))));
        wait();
        app.tick();
        assert_eq!(query_fetches(&log), initial + 2);
    }

    #[test]
    fn test_stale_reply_is_dropped() {
        let (mut app, tx, _log) = test_app();
        let first = app.request(Request::SlowQueries {
            page: 1,
            page_size: 20,
            instance: None,
        });
        let second = app.request(Request::SlowQueries {
            page: 2,
            page_size: 20,
            instance: None,
        });

        // The newer answer arrives first, then the older one.
        tx.send(Reply::answer(
            second,
            Update::SlowQueries {
                instance: None,
                result: Ok(page(vec![query(2, "b", "select 2")], 40)),
            },
        ))
        .unwrap();
        tx.send(Reply::answer(
            first,
            Update::SlowQueries {
                instance: None,
                result: Ok(page(vec![query(1, "a", "select 1")], 40)),
            },
        ))
        .unwrap();

        assert_eq!(app.poll_replies(), 1);
        assert_eq!(app.monitor.queries[0].pid, 2);
        assert!(!app.is_loading(Slot::SlowQueries));
    }

    #[test]
    fn test_errors_persist_until_success() {
        let (mut app, _tx, _log) = test_app();
        app.request(Request::RdsInstances);
        let failed = answer(&app, Update::RdsInstances(Err(ApiError::api(500, "boom"))));
        assert!(app.apply_reply(failed));
        assert_eq!(
            app.current_banner(),
            Some(("RDS instances: HTTP 500: boom", 0))
        );

        // An unrelated success leaves the banner alone.
        app.request(Request::AwsInfo);
        let info = AwsInfo {
            account: "123456789012".to_string(),
            region: "ap-northeast-2".to_string(),
        };
        app.apply_reply(answer(&app, Update::AwsInfo(Ok(info))));
        assert!(app.current_banner().is_some());

        app.request(Request::RdsInstances);
        app.apply_reply(answer(&app, Update::RdsInstances(Ok(Vec::new()))));
        assert!(app.current_banner().is_none());
    }

    #[test]
    fn test_banners_dismissed_by_go_back() {
        let (mut app, _tx, _log) = test_app();
        app.request(Request::DigestStats);
        app.apply_reply(answer(&app, Update::Digest(Err(ApiError::api(502, "")))));
        app.set_view(View::Plans);

        app.go_back();
        assert!(app.banners.is_empty());
        assert_eq!(app.current_view, View::Plans);

        app.go_back();
        assert_eq!(app.current_view, View::Monitor);
    }

    #[test]
    fn test_start_and_stop_are_exclusive() {
        let (mut app, _tx, log) = test_app();
        app.request(Request::MonitorStatus);
        app.apply_reply(answer(&app, Update::MonitorStatus(Ok(monitor_status("running")))));

        assert!(!app.can_start_monitor());
        assert!(app.can_stop_monitor());

        app.start_monitor();
        assert!(!requests(&log).contains(&Request::StartMonitor));

        app.stop_monitor();
        assert!(requests(&log).contains(&Request::StopMonitor));
        // Both are disabled while the action is in flight.
        assert!(!app.can_stop_monitor());
        assert!(!app.can_start_monitor());

        let reply = answer(
            &app,
            Update::MonitorAction {
                start: false,
                result: Ok(monitor_status("stopped")),
            },
        );
        log.lock().unwrap().clear();
        app.apply_reply(reply);
        // Status is re-checked right away.
        assert_eq!(requests(&log), vec![Request::MonitorStatus]);
        assert_eq!(app.get_status_message(), Some("Monitoring stopped"));
    }

    #[test]
    fn test_instance_filter_derived_from_unfiltered_fetch() {
        let (mut app, _tx, log) = test_app();
        app.set_view(View::Plans);
        let plan = |pid: i64, instance: &str| ExplainPlan {
            pid,
            created_at: String::new(),
            instance: instance.to_string(),
            time: 1.0,
            sql_text: "select 1".to_string(),
            explain_result: None,
        };

        app.apply_reply(answer(
            &app,
            Update::ExplainPlans {
                instance: None,
                result: Ok(page(vec![plan(1, "b"), plan(2, "a"), plan(3, "b")], 3)),
            },
        ));
        assert_eq!(app.plans.instances, vec!["a", "b"]);

        app.open_instance_filter();
        if let Some(Overlay::Picker(picker)) = &mut app.overlay {
            assert_eq!(picker.options, vec!["All instances", "a", "b"]);
            picker.down();
            picker.down();
        }
        log.lock().unwrap().clear();
        app.picker_select();
        assert!(app.overlay.is_none());
        assert_eq!(app.plans.instance_filter.as_deref(), Some("b"));
        assert_eq!(
            requests(&log),
            vec![Request::ExplainPlans {
                page: 1,
                page_size: 5,
                instance: Some("b".to_string()),
            }]
        );

        // A filtered fetch leaves the offered instances alone.
        app.apply_reply(answer(
            &app,
            Update::ExplainPlans {
                instance: Some("b".to_string()),
                result: Ok(page(vec![plan(1, "b")], 1)),
            },
        ));
        assert_eq!(app.plans.instances, vec!["a", "b"]);
    }

    #[test]
    fn test_pid_input_stops_at_eighteen_digits() {
        let (mut app, _tx, log) = test_app();
        app.start_pid_input();
        for _ in 0..20 {
            app.input_push('9');
        }
        app.input_confirm();
        assert_eq!(app.monitor.pid_input, "9".repeat(18));
        assert_eq!(app.monitor.pid(), Some(999_999_999_999_999_999));

        app.collect_explain();
        assert!(requests(&log).contains(&Request::CollectExplain {
            pid: 999_999_999_999_999_999
        }));
    }

    #[test]
    fn test_pid_input_accepts_digits_only() {
        let (mut app, _tx, log) = test_app();
        app.start_pid_input();
        for c in "12a3-4".chars() {
            app.input_push(c);
        }
        app.input_confirm();
        assert_eq!(app.monitor.pid_input, "1234");

        app.collect_explain();
        assert!(requests(&log).contains(&Request::CollectExplain { pid: 1234 }));

        let reply = answer(
            &app,
            Update::ExplainCollected(Ok(ExplainResponse {
                status: "success".to_string(),
                message: String::new(),
                pid: 1234,
                instance_name: "orders-prod-1".to_string(),
                timestamp: String::new(),
            })),
        );
        app.apply_reply(reply);
        assert!(app.monitor.confirmation_visible());
    }

    #[test]
    fn test_actions_without_pid_do_nothing() {
        let (mut app, _tx, log) = test_app();
        app.download_markdown();
        app.view_explain();
        assert!(requests(&log).is_empty());
        assert_eq!(app.get_status_message(), Some("Enter a PID first (p)"));
    }

    #[test]
    fn test_date_input_validation() {
        let (mut app, _tx, log) = test_app();
        app.set_view(View::CloudWatch);
        app.check_collection_status();
        assert_eq!(app.get_status_message(), Some("Enter a target date first (d)"));

        app.start_date_input();
        for c in "2025-13-01".chars() {
            app.input_push(c);
        }
        app.input_confirm();
        assert_eq!(app.input_mode, InputMode::Date);
        assert!(app.cloudwatch.target_date.is_none());

        app.cloudwatch.date_input.clear();
        for c in "2025/02/01x2025-02-01".chars() {
            app.input_push(c);
        }
        assert_eq!(app.cloudwatch.date_input, "2025020120");

        app.cloudwatch.date_input = "2025-02-01".to_string();
        app.input_confirm();
        assert_eq!(app.input_mode, InputMode::Normal);

        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        app.check_collection_status();
        assert!(requests(&log).contains(&Request::CollectionStatus { date }));
    }

    #[test]
    fn test_collection_stream_lifecycle() {
        let (mut app, _tx, log) = test_app();
        app.set_view(View::CloudWatch);
        app.start_collection();

        let started = CollectionResponse {
            status: "started".to_string(),
            message: String::new(),
            target_date: "2025-02-01".to_string(),
            timestamp: String::new(),
            collection_id: Some("job-1".to_string()),
        };
        app.apply_reply(answer(&app, Update::CollectionStarted(Ok(started))));
        assert!(requests(&log).contains(&Request::WatchCollection {
            collection_id: "job-1".to_string()
        }));

        let event = |id: &str, event: WatchEvent| {
            Reply::event(Update::Watch {
                collection_id: id.to_string(),
                event,
            })
        };

        assert!(app.apply_reply(event("job-1", WatchEvent::Connected { attempt: 0 })));
        assert_eq!(app.cloudwatch.stream, StreamState::Connected);

        // Events of an older job are ignored.
        assert!(!app.apply_reply(event("job-0", WatchEvent::Finished)));

        app.apply_reply(event(
            "job-1",
            WatchEvent::Event(CollectionEvent::Status {
                status: "running".to_string(),
                message: None,
                progress: Some(50.0),
            }),
        ));
        app.apply_reply(event("job-1", WatchEvent::Reconnecting { attempt: 1, max: 3 }));
        assert_eq!(
            app.cloudwatch.stream,
            StreamState::Reconnecting { attempt: 1, max: 3 }
        );

        log.lock().unwrap().clear();
        app.apply_reply(event("job-1", WatchEvent::Finished));
        assert_eq!(app.cloudwatch.stream, StreamState::Finished);
        assert_eq!(requests(&log), vec![Request::DigestStats]);
        assert_eq!(app.cloudwatch.log.len(), 2);
    }

    #[test]
    fn test_stream_failure_raises_banner() {
        let (mut app, _tx, _log) = test_app();
        app.cloudwatch.start_watch("job-9".to_string());
        app.apply_reply(Reply::event(Update::Watch {
            collection_id: "job-9".to_string(),
            event: WatchEvent::Failed("gave up after 3 reconnects".to_string()),
        }));
        assert_eq!(
            app.current_banner().map(|(msg, _)| msg),
            Some("Progress stream: gave up after 3 reconnects")
        );
    }

    #[test]
    fn test_digest_paging_and_filter() {
        let (mut app, _tx, _log) = test_app();
        app.set_view(View::CloudWatch);
        let stats: Vec<QueryStat> = (0..20)
            .map(|i| QueryStat {
                instance_id: if i % 2 == 0 { "even" } else { "odd" }.to_string(),
                digest_query: format!("select {}", i),
                user: "app".to_string(),
                avg_stats: Default::default(),
                sum_stats: Default::default(),
            })
            .collect();
        app.apply_reply(answer(
            &app,
            Update::Digest(Ok(DigestResponse {
                month: "2025-02".to_string(),
                stats,
            })),
        ));

        assert_eq!(app.cloudwatch.digest_pager.total_pages(), 2);
        assert_eq!(app.row_count(), 15);
        app.page_next();
        assert_eq!(app.row_count(), 5);

        app.start_filter();
        for c in "even".chars() {
            app.input_push(c);
        }
        assert_eq!(app.cloudwatch.digest_pager.page(), 1);
        assert_eq!(app.row_count(), 10);
    }

    #[test]
    fn test_statistics_month_and_filters() {
        let (mut app, _tx, log) = test_app();
        app.set_view(View::Statistics);
        let month: YearMonth = "2025-02".parse().unwrap();
        assert!(requests(&log).contains(&Request::Statistics { month }));

        let stat = |id: &str| SqlStatistics {
            instance_id: id.to_string(),
            month: "2025-02".to_string(),
            ..Default::default()
        };
        app.apply_reply(answer(
            &app,
            Update::Statistics(StatisticsBundle {
                month: Some(month),
                sql: vec![stat("a"), stat("b")],
                sql_fetched: true,
                users_fetched: false,
                failures: vec!["user statistics: HTTP 500".to_string()],
                ..Default::default()
            }),
        ));
        assert_eq!(app.row_count(), 2);
        assert!(app.current_banner().is_some());

        // Per-panel filters are independent.
        app.open_instance_filter();
        app.picker_toggle();
        app.close_overlay();
        assert_eq!(app.row_count(), 1);
        assert!(app.statistics.chart_instances.is_empty());

        app.cycle_stats_panel();
        app.open_instance_filter();
        app.picker_toggle_all();
        assert_eq!(app.statistics.chart_instances.len(), 2);
        app.close_overlay();

        log.lock().unwrap().clear();
        app.cycle_month();
        let next: YearMonth = "2024-12".parse().unwrap();
        assert_eq!(app.statistics.month, next);
        assert_eq!(requests(&log), vec![Request::Statistics { month: next }]);
    }

    #[test]
    fn test_statistics_of_another_month_ignored() {
        let (mut app, _tx, _log) = test_app();
        app.set_view(View::Statistics);
        let other: YearMonth = "2024-11".parse().unwrap();
        let reply = answer(
            &app,
            Update::Statistics(StatisticsBundle {
                month: Some(other),
                ..Default::default()
            }),
        );
        assert!(!app.apply_reply(reply));
        assert!(!app.statistics.loaded);
    }

    #[test]
    fn test_rds_collect_refreshes_inventory() {
        let (mut app, _tx, log) = test_app();
        app.set_view(View::Instances);
        app.collect_rds_instances();
        log.lock().unwrap().clear();

        let response = CollectRdsResponse {
            status: "success".to_string(),
            message: String::new(),
            collected_count: 4,
            details: Default::default(),
        };
        app.apply_reply(answer(&app, Update::RdsCollected(Ok(response))));
        assert_eq!(requests(&log), vec![Request::RdsInstances]);
        assert_eq!(app.get_status_message(), Some("Collected 4 instances"));
    }

    #[test]
    fn test_sql_overlay_and_copy() {
        let (mut app, _tx, _log) = test_app();
        app.request(Request::SlowQueries {
            page: 1,
            page_size: 20,
            instance: None,
        });
        app.apply_reply(answer(
            &app,
            Update::SlowQueries {
                instance: None,
                result: Ok(page(vec![query(77, "a", "select * from t where x = 1")], 1)),
            },
        ));

        app.enter_detail();
        assert_eq!(app.monitor.pid_input, "77");
        assert!(matches!(app.overlay, Some(Overlay::Sql(_))));

        app.copy_sql();
        let copied = app.take_clipboard().unwrap();
        assert!(copied.starts_with("SELECT"));
        assert!(app.take_clipboard().is_none());
    }

    #[test]
    fn test_export_state() {
        let (mut app, _tx, _log) = test_app();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");

        assert!(app.export_state(&path).is_err());

        app.request(Request::SlowQueries {
            page: 1,
            page_size: 20,
            instance: None,
        });
        app.apply_reply(answer(
            &app,
            Update::SlowQueries {
                instance: None,
                result: Ok(page(vec![query(5, "a", "select 1")], 1)),
            },
        ));
        app.export_state(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["view"], "Monitor");
        assert_eq!(written["data"]["queries"][0]["pid"], 5);
    }
}
