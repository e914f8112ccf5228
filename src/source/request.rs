//! Messages exchanged between the UI and a [`DataSource`](super::DataSource).
//!
//! The UI submits [`Request`]s tagged with a sequence number and later
//! receives [`Reply`]s echoing it. Requests that overwrite the same piece of
//! view state share a [`Slot`]; only the reply to the latest request of a
//! slot is applied, so a slow response can never overwrite a newer one.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};

use crate::api::{
    ActionResponse, ApiResult, AwsInfo, CollectRdsResponse, CollectionResponse, DigestResponse,
    ExplainPlan, ExplainResponse, MonitorResponse, Page, RdsInstance, SlowQuery, WatchEvent,
};
use crate::data::{StatisticsBundle, YearMonth};

/// Work the UI asks the backend to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    AwsInfo,
    MonitorStatus,
    StartMonitor,
    StopMonitor,
    SlowQueries {
        page: u32,
        page_size: u32,
        instance: Option<String>,
    },
    CollectExplain {
        pid: i64,
    },
    Explain {
        pid: i64,
    },
    /// Download the markdown EXPLAIN report of `pid` into `dir`.
    ExplainMarkdown {
        pid: i64,
        dir: PathBuf,
    },
    ExplainPlans {
        page: u32,
        page_size: u32,
        instance: Option<String>,
    },
    RunCollection {
        target_date: Option<NaiveDate>,
    },
    CollectionStatus {
        date: NaiveDate,
    },
    /// Follow a collection job's progress stream, replacing any previous one.
    WatchCollection {
        collection_id: String,
    },
    /// Close the current progress stream, if any.
    StopWatch,
    DigestStats,
    CollectRdsInstances,
    RdsInstances,
    /// SQL and per-user statistics of `month` and the month before.
    Statistics {
        month: YearMonth,
    },
    CalculateStatistics {
        month: YearMonth,
    },
}

/// Groups of requests whose replies replace the same view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    AwsInfo,
    MonitorStatus,
    MonitorAction,
    SlowQueries,
    CollectExplain,
    Explain,
    Markdown,
    Plans,
    Collection,
    Watch,
    Digest,
    RdsCollect,
    RdsInstances,
    Statistics,
    Calculate,
}

impl Slot {
    /// Prefix of error banners raised by this slot.
    pub fn label(&self) -> &'static str {
        match self {
            Slot::AwsInfo => "AWS info",
            Slot::MonitorStatus => "Monitor status",
            Slot::MonitorAction => "Monitor",
            Slot::SlowQueries => "Slow queries",
            Slot::CollectExplain => "Collect explain",
            Slot::Explain => "Explain",
            Slot::Markdown => "Markdown download",
            Slot::Plans => "Explain plans",
            Slot::Collection => "CloudWatch collection",
            Slot::Watch => "Progress stream",
            Slot::Digest => "Digest statistics",
            Slot::RdsCollect => "RDS collection",
            Slot::RdsInstances => "RDS instances",
            Slot::Statistics => "Statistics",
            Slot::Calculate => "Calculate statistics",
        }
    }
}

impl Request {
    pub fn slot(&self) -> Slot {
        match self {
            Request::AwsInfo => Slot::AwsInfo,
            Request::MonitorStatus => Slot::MonitorStatus,
            Request::StartMonitor | Request::StopMonitor => Slot::MonitorAction,
            Request::SlowQueries { .. } => Slot::SlowQueries,
            Request::CollectExplain { .. } => Slot::CollectExplain,
            Request::Explain { .. } => Slot::Explain,
            Request::ExplainMarkdown { .. } => Slot::Markdown,
            Request::ExplainPlans { .. } => Slot::Plans,
            Request::RunCollection { .. } | Request::CollectionStatus { .. } => Slot::Collection,
            Request::WatchCollection { .. } | Request::StopWatch => Slot::Watch,
            Request::DigestStats => Slot::Digest,
            Request::CollectRdsInstances => Slot::RdsCollect,
            Request::RdsInstances => Slot::RdsInstances,
            Request::Statistics { .. } => Slot::Statistics,
            Request::CalculateStatistics { .. } => Slot::Calculate,
        }
    }
}

/// Outcome of a request, or an event of a progress stream.
#[derive(Debug)]
pub enum Update {
    AwsInfo(ApiResult<AwsInfo>),
    MonitorStatus(ApiResult<MonitorResponse>),
    MonitorAction {
        start: bool,
        result: ApiResult<MonitorResponse>,
    },
    SlowQueries {
        /// Instance filter the page was fetched with.
        instance: Option<String>,
        result: ApiResult<Page<SlowQuery>>,
    },
    ExplainCollected(ApiResult<ExplainResponse>),
    Explain(ApiResult<ExplainPlan>),
    MarkdownSaved(ApiResult<PathBuf>),
    ExplainPlans {
        instance: Option<String>,
        result: ApiResult<Page<ExplainPlan>>,
    },
    CollectionStarted(ApiResult<CollectionResponse>),
    CollectionStatus(ApiResult<CollectionResponse>),
    /// Progress of the stream opened for `collection_id`.
    Watch {
        collection_id: String,
        event: WatchEvent,
    },
    Digest(ApiResult<DigestResponse>),
    RdsCollected(ApiResult<CollectRdsResponse>),
    RdsInstances(ApiResult<Vec<RdsInstance>>),
    Statistics(StatisticsBundle),
    StatisticsCalculated {
        month: YearMonth,
        result: ApiResult<ActionResponse>,
    },
}

impl Update {
    pub fn slot(&self) -> Slot {
        match self {
            Update::AwsInfo(_) => Slot::AwsInfo,
            Update::MonitorStatus(_) => Slot::MonitorStatus,
            Update::MonitorAction { .. } => Slot::MonitorAction,
            Update::SlowQueries { .. } => Slot::SlowQueries,
            Update::ExplainCollected(_) => Slot::CollectExplain,
            Update::Explain(_) => Slot::Explain,
            Update::MarkdownSaved(_) => Slot::Markdown,
            Update::ExplainPlans { .. } => Slot::Plans,
            Update::CollectionStarted(_) | Update::CollectionStatus(_) => Slot::Collection,
            Update::Watch { .. } => Slot::Watch,
            Update::Digest(_) => Slot::Digest,
            Update::RdsCollected(_) => Slot::RdsCollect,
            Update::RdsInstances(_) => Slot::RdsInstances,
            Update::Statistics(_) => Slot::Statistics,
            Update::StatisticsCalculated { .. } => Slot::Calculate,
        }
    }
}

/// An [`Update`] with the sequence number of the request that produced it.
///
/// Progress stream events are not answers to a request and carry no
/// sequence number.
#[derive(Debug)]
pub struct Reply {
    pub seq: Option<u64>,
    pub update: Update,
}

impl Reply {
    pub fn answer(seq: u64, update: Update) -> Self {
        Self {
            seq: Some(seq),
            update,
        }
    }

    pub fn event(update: Update) -> Self {
        Self { seq: None, update }
    }
}

/// File name of a downloaded markdown report, e.g.
/// `instance_pid_1234_20250201T100000.md`.
pub fn markdown_file_name(pid: i64, now: DateTime<Utc>) -> String {
    format!("instance_pid_{}_{}.md", pid, now.format("%Y%m%dT%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_and_update_slots_agree() {
        let month: YearMonth = "2025-01".parse().unwrap();
        let pairs = [
            (Request::StartMonitor, Slot::MonitorAction),
            (Request::StopMonitor, Slot::MonitorAction),
            (
                Request::RunCollection { target_date: None },
                Slot::Collection,
            ),
            (Request::Statistics { month }, Slot::Statistics),
            (Request::StopWatch, Slot::Watch),
        ];
        for (request, slot) in pairs {
            assert_eq!(request.slot(), slot);
        }

        let update = Update::MonitorAction {
            start: true,
            result: Err(crate::api::ApiError::api(500, "")),
        };
        assert_eq!(update.slot(), Request::StartMonitor.slot());
        assert_eq!(
            Update::Statistics(StatisticsBundle::default()).slot(),
            Request::Statistics { month }.slot()
        );
    }

    #[test]
    fn test_markdown_file_name() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 5).unwrap();
        assert_eq!(
            markdown_file_name(1234, now),
            "instance_pid_1234_20250201T100005.md"
        );
    }
}
