//! View-state helpers on top of backend payloads.
//!
//! Nothing here talks to the backend. These modules turn backend payloads
//! into what the views display and hold the small amount of local state
//! the views keep (page cursors, selections, timers).
//!
//! ## Submodules
//!
//! - [`pagination`]: page cursor and page-number window ([`Pager`])
//! - [`sql`]: SQL pretty-printing for the query overlays
//! - [`plan`]: `EXPLAIN FORMAT=JSON` into a levelled node graph and table details
//! - [`month`]: `YYYY-MM` months for the statistics endpoints ([`YearMonth`])
//! - [`statistics`]: instance filters, month comparison and chart metrics
//! - [`inventory`]: RDS inventory helpers
//! - [`format`]: number and timestamp display
//! - [`duration`]: interval parsing (e.g., "500ms", "10s", "1m")
//! - [`schedule`]: repeating timers for polling ([`Ticker`])

pub mod duration;
pub mod format;
pub mod inventory;
pub mod month;
pub mod pagination;
pub mod plan;
pub mod schedule;
pub mod sql;
pub mod statistics;

pub use month::YearMonth;
pub use pagination::Pager;
pub use plan::{PlanNode, QueryPlan, TableAccess};
pub use schedule::Ticker;
pub use sql::format_sql;
pub use statistics::{
    chart_bars, ChartBar, InstanceSelection, Metric, MetricSelection, StatisticsBundle,
};
