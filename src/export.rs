//! Non-interactive JSON snapshot of the backend.
//!
//! `slowquery-console --export out.json` fetches what every view shows on
//! open and writes it to a file without starting the TUI.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::{
    ApiClient, ApiResult, AwsInfo, DigestResponse, ExplainPlan, MonitorResponse, Page,
    RdsInstance, SlowQuery, SqlStatistics, UserStatistics,
};
use crate::data::YearMonth;
use crate::source::fetch_statistics;

/// Statistics of a month and the month before.
#[derive(Debug, Serialize)]
pub struct StatisticsSnapshot {
    pub month: YearMonth,
    pub previous_month: YearMonth,
    pub sql: Vec<SqlStatistics>,
    pub users: Vec<UserStatistics>,
    pub previous_sql: Vec<SqlStatistics>,
    pub previous_users: Vec<UserStatistics>,
}

/// Everything the dashboard shows on first load.
///
/// Each part is fetched on its own; a failed part is `None` and its error
/// is listed in `failures`.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub exported_at: String,
    pub aws: Option<AwsInfo>,
    pub monitor: Option<MonitorResponse>,
    pub slow_queries: Option<Page<SlowQuery>>,
    pub explain_plans: Option<Page<ExplainPlan>>,
    pub digest: Option<DigestResponse>,
    pub rds_instances: Option<Vec<RdsInstance>>,
    pub statistics: StatisticsSnapshot,
    pub failures: Vec<String>,
}

/// Page sizes of the first pages included in a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotSizes {
    pub queries: u32,
    pub plans: u32,
}

fn settle<T>(result: ApiResult<T>, what: &str, failures: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(what, error = %e, "Snapshot part failed");
            failures.push(format!("{}: {}", what, e.banner()));
            None
        }
    }
}

/// Fetch a snapshot, with statistics for `month`.
pub async fn snapshot(client: &ApiClient, month: YearMonth, sizes: SnapshotSizes) -> Snapshot {
    let (aws, monitor, queries, plans, digest, instances, bundle) = tokio::join!(
        client.aws_info(),
        client.monitor_status(),
        client.slow_queries(1, sizes.queries, None),
        client.explain_plans(1, sizes.plans, None),
        client.digest_stats(),
        client.rds_instances(),
        fetch_statistics(client, month),
    );

    let mut failures = Vec::new();
    let aws = settle(aws, "AWS info", &mut failures);
    let monitor = settle(monitor, "Monitor status", &mut failures);
    let slow_queries = settle(queries, "Slow queries", &mut failures);
    let explain_plans = settle(plans, "Explain plans", &mut failures);
    let digest = settle(digest, "Digest statistics", &mut failures);
    let rds_instances = settle(instances, "RDS instances", &mut failures);
    failures.extend(bundle.failures);

    Snapshot {
        exported_at: Utc::now().to_rfc3339(),
        aws,
        monitor,
        slow_queries,
        explain_plans,
        digest,
        rds_instances,
        statistics: StatisticsSnapshot {
            month,
            previous_month: month.prev(),
            sql: bundle.sql,
            users: bundle.users,
            previous_sql: bundle.prev_sql,
            previous_users: bundle.prev_users,
        },
        failures,
    }
}

/// Write `snapshot` as pretty JSON to `path`.
pub fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    info!(
        path = %path.display(),
        failures = snapshot.failures.len(),
        "Wrote snapshot"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::ApiConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SIZES: SnapshotSizes = SnapshotSizes {
        queries: 20,
        plans: 5,
    };

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(ApiConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            aws_info_attempts: 1,
            retry_delay: Duration::from_millis(10),
        })
        .unwrap()
    }

    async fn mock_json(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_snapshot_collects_every_part() {
        let server = MockServer::start().await;
        let empty_page = json!({"total": 0, "page": 1, "page_size": 20, "items": []});
        mock_json(&server, "/aws/info", json!({"account": "123456789012", "region": "ap-northeast-2"})).await;
        mock_json(&server, "/mysql/status", json!({"status": "running"})).await;
        mock_json(&server, "/mysql/queries", empty_page.clone()).await;
        mock_json(&server, "/explain/plans", empty_page).await;
        mock_json(&server, "/cw-slowquery/digest/stats", json!({"month": "2025-01", "stats": []})).await;
        mock_json(&server, "/rds-instances", json!([{"DBInstanceIdentifier": "orders-prod-1"}])).await;
        mock_json(&server, "/sql/statistics/2025-01", json!([{"instance_id": "orders-prod-1", "month": "2025-01"}])).await;
        mock_json(&server, "/sql/statistics/users/2025-01", json!([])).await;
        mock_json(&server, "/sql/statistics/2024-12", json!([])).await;
        mock_json(&server, "/sql/statistics/users/2024-12", json!([])).await;

        let month: YearMonth = "2025-01".parse().unwrap();
        let snapshot = snapshot(&client_for(&server), month, SIZES).await;

        assert!(snapshot.failures.is_empty(), "{:?}", snapshot.failures);
        assert_eq!(snapshot.aws.unwrap().region, "ap-northeast-2");
        assert!(snapshot.monitor.unwrap().is_running());
        assert_eq!(snapshot.rds_instances.unwrap().len(), 1);
        assert_eq!(snapshot.statistics.sql.len(), 1);
        assert_eq!(snapshot.statistics.previous_month.to_string(), "2024-12");
    }

    #[tokio::test]
    async fn test_failed_parts_are_reported_and_written() {
        let server = MockServer::start().await;
        mock_json(&server, "/mysql/status", json!({"status": "stopped"})).await;
        Mock::given(method("GET"))
            .and(path("/rds-instances"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "db down"})))
            .mount(&server)
            .await;

        let month: YearMonth = "2025-01".parse().unwrap();
        let snapshot = snapshot(&client_for(&server), month, SIZES).await;

        assert!(snapshot.monitor.is_some());
        assert!(snapshot.rds_instances.is_none());
        assert!(snapshot
            .failures
            .iter()
            .any(|f| f == "RDS instances: HTTP 500: db down"));

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("snapshot.json");
        write_snapshot(&snapshot, &out).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["monitor"]["status"], "stopped");
        assert_eq!(written["statistics"]["month"], "2025-01");
        assert!(written["rds_instances"].is_null());
    }
}
