//! Access to the slow query backend.
//!
//! - [`client`]: REST endpoints ([`ApiClient`])
//! - [`collection`]: WebSocket progress stream of CloudWatch collection jobs
//! - [`types`]: payloads exchanged with the backend
//! - [`error`]: [`ApiError`] and [`ApiResult`]

pub mod client;
pub mod collection;
pub mod error;
pub mod types;

pub use client::{ApiClient, ApiConfig};
pub use collection::{watch_collection, CollectionEvent, WatchConfig, WatchEvent};
pub use error::{ApiError, ApiResult};
pub use types::{
    ActionResponse, AvgStats, AwsInfo, CollectDetails, CollectRdsResponse, CollectionResponse,
    DigestResponse, ExplainPlan, ExplainResponse, ExplainResult, MonitorResponse, Page,
    QueryStat, RdsEndpoint, RdsInstance, SlowQuery, SqlStatistics, SumStats, UserStatistics,
};
