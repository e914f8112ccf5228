//! HTTP client for the slow query backend.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::error::{ApiError, ApiResult};
use super::types::{
    ActionResponse, AwsInfo, CollectRdsResponse, CollectionResponse, DigestResponse,
    ExplainPlan, ExplainResponse, MonitorResponse, Page, RdsInstance, SlowQuery, SqlStatistics,
    UserStatistics,
};
use crate::data::YearMonth;

/// Connection settings for [`ApiClient`].
///
/// # Examples
///
/// ```
/// use slowquery_console::api::ApiConfig;
///
/// let config = ApiConfig::default();
/// assert_eq!(config.base_url, "http://localhost:8000");
/// assert_eq!(config.aws_info_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
    /// Total attempts for the AWS identity lookup.
    pub aws_info_attempts: u32,
    /// Delay between AWS identity attempts.
    pub retry_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
            aws_info_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Async client with one method per backend endpoint.
///
/// Non-2xx responses are turned into [`ApiError::Api`] carrying the
/// backend's `detail` or `message` text. Only [`ApiClient::aws_info`]
/// retries; everything else fails fast and lets the UI show a banner.
///
/// # Examples
///
/// ```no_run
/// use slowquery_console::api::{ApiClient, ApiConfig};
///
/// # tokio_test::block_on(async {
/// let client = ApiClient::new(ApiConfig::default()).unwrap();
/// let status = client.monitor_status().await.unwrap();
/// println!("monitor is {}", status.status);
/// # });
/// ```
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.config.timeout)
            .field("aws_info_attempts", &self.config.aws_info_attempts)
            .finish()
    }
}

impl ApiClient {
    /// Create a client, validating the base URL.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::config(format!("Invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::config(format!(
                "Base URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("slowquery-console/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %base_url,
            timeout_ms = config.timeout.as_millis() as u64,
            "Created backend API client"
        );

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::config(format!("Base URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        debug!(url = %url, "POST");
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        read_json(response).await
    }

    /// Start the MySQL slow query scraper.
    ///
    /// POST /mysql/start
    pub async fn start_monitor(&self) -> ApiResult<MonitorResponse> {
        let url = self.endpoint(&["mysql", "start"])?;
        let response: MonitorResponse = self.post_json(url, None).await?;
        info!(status = %response.status, "Requested monitor start");
        Ok(response)
    }

    /// Stop the MySQL slow query scraper.
    ///
    /// POST /mysql/stop
    pub async fn stop_monitor(&self) -> ApiResult<MonitorResponse> {
        let url = self.endpoint(&["mysql", "stop"])?;
        let response: MonitorResponse = self.post_json(url, None).await?;
        info!(status = %response.status, "Requested monitor stop");
        Ok(response)
    }

    /// GET /mysql/status
    pub async fn monitor_status(&self) -> ApiResult<MonitorResponse> {
        let url = self.endpoint(&["mysql", "status"])?;
        self.get_json(url).await
    }

    /// One page of captured slow queries, optionally for a single instance.
    ///
    /// GET /mysql/queries?page&page_size&instance
    pub async fn slow_queries(
        &self,
        page: u32,
        page_size: u32,
        instance: Option<&str>,
    ) -> ApiResult<Page<SlowQuery>> {
        let mut url = self.endpoint(&["mysql", "queries"])?;
        append_page_query(&mut url, page, page_size, instance);
        self.get_json(url).await
    }

    /// Ask the backend to capture an EXPLAIN for a running query.
    ///
    /// POST /mysql/explain/{pid}
    pub async fn collect_explain(&self, pid: i64) -> ApiResult<ExplainResponse> {
        let pid_text = pid.to_string();
        let url = self.endpoint(&["mysql", "explain", pid_text.as_str()])?;
        let response: ExplainResponse = self.post_json(url, None).await?;
        info!(pid, instance = %response.instance_name, "Captured explain plan");
        Ok(response)
    }

    /// GET /mysql/explain/{pid}
    pub async fn explain(&self, pid: i64) -> ApiResult<ExplainPlan> {
        let pid_text = pid.to_string();
        let url = self.endpoint(&["mysql", "explain", pid_text.as_str()])?;
        self.get_json(url).await
    }

    /// Markdown report of a captured EXPLAIN.
    ///
    /// GET /mysql/explain/{pid}/markdown
    pub async fn explain_markdown(&self, pid: i64) -> ApiResult<String> {
        let pid_text = pid.to_string();
        let url = self.endpoint(&["mysql", "explain", pid_text.as_str(), "markdown"])?;
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::api(status.as_u16(), error_message(&body)));
        }
        Ok(body)
    }

    /// Recently captured EXPLAIN plans.
    ///
    /// GET /explain/plans?page&page_size&instance
    pub async fn explain_plans(
        &self,
        page: u32,
        page_size: u32,
        instance: Option<&str>,
    ) -> ApiResult<Page<ExplainPlan>> {
        let mut url = self.endpoint(&["explain", "plans"])?;
        append_page_query(&mut url, page, page_size, instance);
        self.get_json(url).await
    }

    /// Start a CloudWatch slow log collection job.
    ///
    /// POST /cloudwatch/run
    pub async fn run_collection(
        &self,
        target_date: Option<NaiveDate>,
    ) -> ApiResult<CollectionResponse> {
        let url = self.endpoint(&["cloudwatch", "run"])?;
        let body = match target_date {
            Some(date) => serde_json::json!({ "target_date": date.format("%Y-%m-%d").to_string() }),
            None => serde_json::json!({}),
        };
        let response: CollectionResponse = self.post_json(url, Some(body)).await?;
        info!(
            status = %response.status,
            target_date = %response.target_date,
            collection_id = response.collection_id.as_deref().unwrap_or("-"),
            "Started CloudWatch collection"
        );
        Ok(response)
    }

    /// GET /cloudwatch/status/{date}
    pub async fn collection_status(&self, date: NaiveDate) -> ApiResult<CollectionResponse> {
        let date_text = date.format("%Y-%m-%d").to_string();
        let url = self.endpoint(&["cloudwatch", "status", date_text.as_str()])?;
        self.get_json(url).await
    }

    /// WebSocket URL of a collection job's progress stream.
    ///
    /// WS /ws/collection/{collection_id}
    pub fn collection_ws_url(&self, collection_id: &str) -> ApiResult<Url> {
        let mut url = self.endpoint(&["ws", "collection", collection_id])?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ApiError::config(format!("Cannot derive WebSocket URL from {}", url)))?;
        Ok(url)
    }

    /// CloudWatch slow log digest statistics.
    ///
    /// GET /cw-slowquery/digest/stats
    pub async fn digest_stats(&self) -> ApiResult<DigestResponse> {
        let url = self.endpoint(&["cw-slowquery", "digest", "stats"])?;
        self.get_json(url).await
    }

    /// Refresh the RDS inventory from AWS.
    ///
    /// POST /collectors/rds-instances
    pub async fn collect_rds_instances(&self) -> ApiResult<CollectRdsResponse> {
        let url = self.endpoint(&["collectors", "rds-instances"])?;
        let response: CollectRdsResponse = self.post_json(url, None).await?;
        info!(
            status = %response.status,
            collected = response.collected_count,
            "Collected RDS instances"
        );
        Ok(response)
    }

    /// GET /rds-instances
    pub async fn rds_instances(&self) -> ApiResult<Vec<RdsInstance>> {
        let url = self.endpoint(&["rds-instances"])?;
        self.get_json(url).await
    }

    /// GET /sql/statistics/{yearMonth}
    pub async fn sql_statistics(&self, month: YearMonth) -> ApiResult<Vec<SqlStatistics>> {
        let month_text = month.to_string();
        let url = self.endpoint(&["sql", "statistics", month_text.as_str()])?;
        self.get_json(url).await
    }

    /// GET /sql/statistics/users/{yearMonth}
    pub async fn user_statistics(&self, month: YearMonth) -> ApiResult<Vec<UserStatistics>> {
        let month_text = month.to_string();
        let url = self.endpoint(&["sql", "statistics", "users", month_text.as_str()])?;
        self.get_json(url).await
    }

    /// Recompute the monthly aggregates on the backend.
    ///
    /// POST /sql/statistics/calculate/{yearMonth}
    pub async fn calculate_statistics(&self, month: YearMonth) -> ApiResult<ActionResponse> {
        let month_text = month.to_string();
        let url = self.endpoint(&["sql", "statistics", "calculate", month_text.as_str()])?;
        let response: ActionResponse = self.post_json(url, None).await?;
        info!(month = %month, status = %response.status, "Requested statistics calculation");
        Ok(response)
    }

    /// Account and region the backend runs against.
    ///
    /// GET /aws/info, retried a fixed number of times.
    pub async fn aws_info(&self) -> ApiResult<AwsInfo> {
        let url = self.endpoint(&["aws", "info"])?;
        let max_attempts = self.config.aws_info_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.get_json::<AwsInfo>(url.clone()).await {
                Ok(info) => return Ok(info),
                Err(e) if attempt < max_attempts => {
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        "Failed to fetch AWS info, will retry"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, attempts = attempt, "Giving up on AWS info");
                    return Err(e);
                }
            }
        }
    }
}

fn append_page_query(url: &mut Url, page: u32, page_size: u32, instance: Option<&str>) {
    let mut query = url.query_pairs_mut();
    query.append_pair("page", &page.to_string());
    query.append_pair("page_size", &page_size.to_string());
    if let Some(instance) = instance.filter(|i| !i.is_empty()) {
        query.append_pair("instance", instance);
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        warn!(status = status.as_u16(), "Backend returned an error");
        return Err(ApiError::api(status.as_u16(), error_message(&body)));
    }
    Ok(serde_json::from_str(&body)?)
}

/// Pull a human readable message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(ApiConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            aws_info_attempts: 3,
            retry_delay: Duration::from_millis(10),
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ApiClient::new(ApiConfig {
            base_url: "not a url".into(),
            ..ApiConfig::default()
        });
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ApiClient::new(ApiConfig {
            base_url: "http://backend:8000/api/".into(),
            ..ApiConfig::default()
        })
        .unwrap();
        let url = client.endpoint(&["mysql", "status"]).unwrap();
        assert_eq!(url.as_str(), "http://backend:8000/api/mysql/status");
    }

    #[test]
    fn test_collection_ws_url() {
        let client = ApiClient::new(ApiConfig::default()).unwrap();
        let url = client.collection_ws_url("job-42").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/collection/job-42");

        let secure = ApiClient::new(ApiConfig {
            base_url: "https://dash.example.com".into(),
            ..ApiConfig::default()
        })
        .unwrap();
        let url = secure.collection_ws_url("job-42").unwrap();
        assert_eq!(url.as_str(), "wss://dash.example.com/ws/collection/job-42");
    }

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(error_message(r#"{"detail": "PID not found"}"#), "PID not found");
        assert_eq!(error_message(r#"{"message": "busy"}"#), "busy");
        assert_eq!(error_message("Internal Server Error\n"), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_slow_queries_sends_paging_and_instance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mysql/queries"))
            .and(query_param("page", "2"))
            .and(query_param("page_size", "20"))
            .and(query_param("instance", "orders-prod-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 21, "page": 2, "page_size": 20,
                "items": [{
                    "pid": 77, "instance": "orders-prod-1", "db": "orders", "user": "app",
                    "host": "10.0.0.1", "time": 3.25, "sql_text": "select 1",
                    "start": "2025-02-01T10:00:00"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server)
            .slow_queries(2, 20, Some("orders-prod-1"))
            .await
            .unwrap();
        assert_eq!(page.total, 21);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].pid, 77);
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mysql/explain/99"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({ "detail": "Process 99 not found" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).collect_explain(99).await.unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Process 99 not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_collection_posts_target_date() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cloudwatch/run"))
            .and(body_json(serde_json::json!({ "target_date": "2025-02-03" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "started",
                "message": "Collection started",
                "target_date": "2025-02-03",
                "timestamp": "2025-02-04T09:00:00",
                "collection_id": "abc123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let response = client_for(&server).run_collection(Some(date)).await.unwrap();
        assert_eq!(response.collection_id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_aws_info_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/aws/info"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/aws/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "account": "123456789012",
                "region": "ap-northeast-2"
            })))
            .mount(&server)
            .await;

        let info = client_for(&server).aws_info().await.unwrap();
        assert_eq!(info.region, "ap-northeast-2");
    }

    #[tokio::test]
    async fn test_aws_info_gives_up_after_fixed_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/aws/info"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).aws_info().await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_statistics_use_year_month_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sql/statistics/users/2025-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "instance_id": "orders-prod-1", "month": "2025-01", "user": "app", "total_queries": 5 }
            ])))
            .mount(&server)
            .await;

        let month: YearMonth = "2025-01".parse().unwrap();
        let users = client_for(&server).user_statistics(month).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].total_queries, 5);
    }

    #[tokio::test]
    async fn test_explain_markdown_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mysql/explain/12/markdown"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Explain\n"))
            .mount(&server)
            .await;

        let text = client_for(&server).explain_markdown(12).await.unwrap();
        assert_eq!(text, "# Explain\n");
    }
}
