//! Backend payload types.
//!
//! These types match the JSON produced by the slow query backend. They are
//! read-only from the console's point of view: nothing here is computed
//! locally. Timestamps stay as strings and are formatted at display time
//! because the backend mixes RFC 3339 and naive ISO formats.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// AWS account identity of the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsInfo {
    pub account: String,
    pub region: String,
}

/// Response of the MySQL monitor lifecycle endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorResponse {
    /// `running` while the scraper is active.
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
}

impl MonitorResponse {
    /// Whether the slow query scraper is currently running.
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// A slow query captured from the MySQL process list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowQuery {
    pub pid: i64,
    pub instance: String,
    #[serde(default)]
    pub db: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub host: String,
    /// Execution time in seconds.
    pub time: f64,
    pub sql_text: String,
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// A page of results from a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            total: 0,
            page: 1,
            page_size: 0,
            items: Vec::new(),
        }
    }
}

/// Acknowledgement of an EXPLAIN capture request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub pid: i64,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A stored EXPLAIN plan for a slow query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainPlan {
    pub pid: i64,
    #[serde(default)]
    pub created_at: String,
    pub instance: String,
    #[serde(default)]
    pub time: f64,
    pub sql_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain_result: Option<ExplainResult>,
}

/// The raw EXPLAIN output captured by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainResult {
    /// `EXPLAIN FORMAT=JSON` document.
    #[serde(default)]
    pub json: serde_json::Value,
    /// `EXPLAIN FORMAT=TREE` text.
    #[serde(default)]
    pub tree: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Network endpoint of an RDS instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RdsEndpoint {
    pub address: String,
    pub port: u16,
}

/// An RDS instance as stored by the inventory collector.
///
/// Field names follow the AWS `DescribeDBInstances` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RdsInstance {
    #[serde(rename = "DBInstanceIdentifier")]
    pub identifier: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub engine_version: String,
    #[serde(rename = "DBInstanceStatus", default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<RdsEndpoint>,
    #[serde(default)]
    pub instance_create_time: String,
    #[serde(rename = "updateTime", default)]
    pub update_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

/// Details of an RDS inventory collection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectDetails {
    #[serde(default)]
    pub instance_ids: Vec<String>,
}

/// Response of the RDS inventory collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectRdsResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub collected_count: u64,
    #[serde(default)]
    pub details: CollectDetails,
}

impl CollectRdsResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Response of the CloudWatch collection job endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub target_date: String,
    #[serde(default)]
    pub timestamp: String,
    /// Identifier of the job's progress stream, when the backend started one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
}

/// Average per-execution figures of a query digest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvgStats {
    #[serde(default)]
    pub avg_lock_time: f64,
    #[serde(default)]
    pub avg_rows_examined: f64,
    #[serde(default)]
    pub avg_rows_sent: f64,
    #[serde(default)]
    pub avg_time: f64,
}

/// Summed figures of a query digest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SumStats {
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub total_time: f64,
}

/// One normalized query digest from the CloudWatch slow log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStat {
    pub instance_id: String,
    pub digest_query: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub avg_stats: AvgStats,
    #[serde(default)]
    pub sum_stats: SumStats,
}

/// Digest statistics for a month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestResponse {
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub stats: Vec<QueryStat>,
}

/// Monthly slow query aggregate for one instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlStatistics {
    pub instance_id: String,
    pub month: String,
    pub unique_digest_count: u64,
    pub total_slow_query_count: u64,
    pub total_execution_count: u64,
    pub total_execution_time: f64,
    pub avg_execution_time: f64,
    pub total_rows_examined: u64,
    pub read_query_count: u64,
    pub write_query_count: u64,
    pub ddl_query_count: u64,
    pub commit_query_count: u64,
    pub created_at: String,
    pub timestamp: String,
}

/// Monthly slow query aggregate for one user on one instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStatistics {
    pub instance_id: String,
    pub month: String,
    pub user: String,
    pub total_queries: u64,
    pub total_exec_count: u64,
    pub total_exec_time: f64,
    pub avg_execution_time: f64,
    pub read_query_count: u64,
    pub write_query_count: u64,
    pub ddl_query_count: u64,
    pub commit_query_count: u64,
    pub created_at: String,
}

/// Generic status/message acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rds_instance_uses_aws_field_names() {
        let json = r#"{
            "DBInstanceIdentifier": "orders-prod-1",
            "Engine": "aurora-mysql",
            "EngineVersion": "8.0.mysql_aurora.3.04.0",
            "DBInstanceStatus": "available",
            "Endpoint": { "Address": "orders.abc.ap-northeast-2.rds.amazonaws.com", "Port": 3306 },
            "InstanceCreateTime": "2024-01-10T02:11:00Z",
            "updateTime": "2025-02-01T00:00:00Z",
            "Tags": { "real_time_slow_sql": "true", "env": "prod" }
        }"#;

        let instance: RdsInstance = serde_json::from_str(json).unwrap();
        assert_eq!(instance.identifier, "orders-prod-1");
        assert_eq!(instance.status, "available");
        assert_eq!(instance.endpoint.as_ref().unwrap().port, 3306);
        assert_eq!(instance.update_time, "2025-02-01T00:00:00Z");
        assert_eq!(instance.tags.unwrap().get("env").unwrap(), "prod");
    }

    #[test]
    fn test_rds_instance_without_endpoint_or_tags() {
        let json = r#"{"DBInstanceIdentifier": "creating-1", "Engine": "mysql"}"#;
        let instance: RdsInstance = serde_json::from_str(json).unwrap();
        assert!(instance.endpoint.is_none());
        assert!(instance.tags.is_none());
        assert!(instance.update_time.is_empty());
    }

    #[test]
    fn test_statistics_missing_counters_default_to_zero() {
        let json = r#"{"instance_id": "orders-prod-1", "month": "2025-01", "total_slow_query_count": 42}"#;
        let stat: SqlStatistics = serde_json::from_str(json).unwrap();
        assert_eq!(stat.total_slow_query_count, 42);
        assert_eq!(stat.total_execution_count, 0);
        assert_eq!(stat.avg_execution_time, 0.0);
    }

    #[test]
    fn test_slow_query_page() {
        let json = r#"{
            "total": 41, "page": 2, "page_size": 20,
            "items": [{
                "pid": 1234, "instance": "orders-prod-1", "db": "orders",
                "user": "app", "host": "10.0.0.12", "time": 12.5,
                "sql_text": "select 1", "start": "2025-02-01T10:00:00"
            }]
        }"#;
        let page: Page<SlowQuery> = serde_json::from_str(json).unwrap();
        assert_eq!(page.total, 41);
        assert_eq!(page.items[0].pid, 1234);
        assert!(page.items[0].end.is_none());
    }

    #[test]
    fn test_monitor_running() {
        let json = r#"{"status": "running", "message": "ok", "timestamp": "2025-02-01T10:00:00"}"#;
        let status: MonitorResponse = serde_json::from_str(json).unwrap();
        assert!(status.is_running());

        let stopped = MonitorResponse {
            status: "stopped".into(),
            ..status
        };
        assert!(!stopped.is_running());
    }
}
