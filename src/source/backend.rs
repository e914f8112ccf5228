//! Data source backed by the slow query REST/WebSocket backend.

use std::path::Path;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::request::{markdown_file_name, Reply, Request, Update};
use super::DataSource;
use crate::api::{watch_collection, ApiClient, ApiResult, WatchConfig, WatchEvent};
use crate::data::{StatisticsBundle, YearMonth};

/// A data source that runs every request as its own task on a tokio runtime.
///
/// A dispatcher task receives submitted requests, spawns one task per
/// request against the [`ApiClient`] and funnels the results back through a
/// channel drained by [`DataSource::poll`]. At most one collection progress
/// stream is open at a time; watching a new job closes the previous stream.
///
/// # Example
///
/// ```no_run
/// use slowquery_console::api::{ApiClient, ApiConfig, WatchConfig};
/// use slowquery_console::source::{BackendSource, DataSource, Request};
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let client = ApiClient::new(ApiConfig::default()).unwrap();
/// let mut source = BackendSource::spawn(runtime.handle(), client, WatchConfig::default());
/// source.submit(1, Request::MonitorStatus);
/// ```
#[derive(Debug)]
pub struct BackendSource {
    requests: mpsc::UnboundedSender<(u64, Request)>,
    replies: mpsc::UnboundedReceiver<Reply>,
    description: String,
    last_error: Option<String>,
}

impl BackendSource {
    /// Spawn the dispatcher on `handle`.
    pub fn spawn(handle: &Handle, client: ApiClient, watch_config: WatchConfig) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let description = format!("backend: {}", client.base_url());

        handle.spawn(dispatch(
            handle.clone(),
            client,
            watch_config,
            request_rx,
            reply_tx,
        ));

        Self {
            requests: request_tx,
            replies: reply_rx,
            description,
            last_error: None,
        }
    }
}

impl DataSource for BackendSource {
    fn submit(&mut self, seq: u64, request: Request) {
        if self.requests.send((seq, request)).is_err() {
            self.last_error = Some("Backend dispatcher stopped".to_string());
        }
    }

    fn poll(&mut self) -> Option<Reply> {
        match self.replies.try_recv() {
            Ok(reply) => Some(reply),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.last_error = Some("Backend dispatcher stopped".to_string());
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

async fn dispatch(
    handle: Handle,
    client: ApiClient,
    watch_config: WatchConfig,
    mut requests: mpsc::UnboundedReceiver<(u64, Request)>,
    replies: mpsc::UnboundedSender<Reply>,
) {
    let mut watcher: Option<JoinHandle<()>> = None;

    while let Some((seq, request)) = requests.recv().await {
        debug!(seq, slot = ?request.slot(), "Dispatching request");
        match request {
            Request::WatchCollection { collection_id } => {
                if let Some(previous) = watcher.take() {
                    previous.abort();
                }
                watcher = open_watch(&handle, &client, &watch_config, collection_id, &replies);
            }
            Request::StopWatch => {
                if let Some(previous) = watcher.take() {
                    info!("Closing collection progress stream");
                    previous.abort();
                }
            }
            request => {
                let client = client.clone();
                let replies = replies.clone();
                handle.spawn(async move {
                    if let Some(update) = execute(&client, request).await {
                        let _ = replies.send(Reply::answer(seq, update));
                    }
                });
            }
        }
    }

    if let Some(previous) = watcher.take() {
        previous.abort();
    }
    debug!("Request channel closed, dispatcher exiting");
}

/// Start following a collection job. Events are forwarded without a
/// sequence number; the task is aborted when another job is watched.
fn open_watch(
    handle: &Handle,
    client: &ApiClient,
    config: &WatchConfig,
    collection_id: String,
    replies: &mpsc::UnboundedSender<Reply>,
) -> Option<JoinHandle<()>> {
    let url = match client.collection_ws_url(&collection_id) {
        Ok(url) => url,
        Err(e) => {
            warn!(collection_id = %collection_id, error = %e, "Cannot build progress stream URL");
            let _ = replies.send(Reply::event(Update::Watch {
                collection_id,
                event: WatchEvent::Failed(e.banner()),
            }));
            return None;
        }
    };

    info!(collection_id = %collection_id, url = %url, "Watching collection progress");
    let config = config.clone();
    let replies = replies.clone();

    Some(handle.spawn(async move {
        let (tx, mut rx) = mpsc::channel(64);
        let forward = async {
            while let Some(event) = rx.recv().await {
                let update = Update::Watch {
                    collection_id: collection_id.clone(),
                    event,
                };
                if replies.send(Reply::event(update)).is_err() {
                    break;
                }
            }
        };
        tokio::join!(watch_collection(url, config, tx), forward);
    }))
}

/// Run one request against the backend. Stream control requests are
/// handled by the dispatcher and yield nothing here.
async fn execute(client: &ApiClient, request: Request) -> Option<Update> {
    let update = match request {
        Request::AwsInfo => Update::AwsInfo(client.aws_info().await),
        Request::MonitorStatus => Update::MonitorStatus(client.monitor_status().await),
        Request::StartMonitor => Update::MonitorAction {
            start: true,
            result: client.start_monitor().await,
        },
        Request::StopMonitor => Update::MonitorAction {
            start: false,
            result: client.stop_monitor().await,
        },
        Request::SlowQueries {
            page,
            page_size,
            instance,
        } => {
            let result = client
                .slow_queries(page, page_size, instance.as_deref())
                .await;
            Update::SlowQueries { instance, result }
        }
        Request::CollectExplain { pid } => Update::ExplainCollected(client.collect_explain(pid).await),
        Request::Explain { pid } => Update::Explain(client.explain(pid).await),
        Request::ExplainMarkdown { pid, dir } => {
            Update::MarkdownSaved(save_markdown(client, pid, &dir).await)
        }
        Request::ExplainPlans {
            page,
            page_size,
            instance,
        } => {
            let result = client
                .explain_plans(page, page_size, instance.as_deref())
                .await;
            Update::ExplainPlans { instance, result }
        }
        Request::RunCollection { target_date } => {
            Update::CollectionStarted(client.run_collection(target_date).await)
        }
        Request::CollectionStatus { date } => {
            Update::CollectionStatus(client.collection_status(date).await)
        }
        Request::DigestStats => Update::Digest(client.digest_stats().await),
        Request::CollectRdsInstances => Update::RdsCollected(client.collect_rds_instances().await),
        Request::RdsInstances => Update::RdsInstances(client.rds_instances().await),
        Request::Statistics { month } => Update::Statistics(fetch_statistics(client, month).await),
        Request::CalculateStatistics { month } => Update::StatisticsCalculated {
            month,
            result: client.calculate_statistics(month).await,
        },
        Request::WatchCollection { .. } | Request::StopWatch => return None,
    };
    Some(update)
}

async fn save_markdown(client: &ApiClient, pid: i64, dir: &Path) -> ApiResult<std::path::PathBuf> {
    let markdown = client.explain_markdown(pid).await?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(markdown_file_name(pid, Utc::now()));
    tokio::fs::write(&path, markdown).await?;
    info!(pid, path = %path.display(), "Saved explain report");
    Ok(path)
}

/// Fetch a month and the month before concurrently. Every fetch settles on
/// its own; a failure empties its list and is recorded.
pub async fn fetch_statistics(client: &ApiClient, month: YearMonth) -> StatisticsBundle {
    let prev = month.prev();
    let (sql, users, prev_sql, prev_users) = tokio::join!(
        client.sql_statistics(month),
        client.user_statistics(month),
        client.sql_statistics(prev),
        client.user_statistics(prev),
    );

    let mut bundle = StatisticsBundle {
        month: Some(month),
        sql_fetched: sql.is_ok(),
        users_fetched: users.is_ok(),
        ..Default::default()
    };
    bundle.sql = settle(sql, format!("SQL statistics {}", month), &mut bundle.failures);
    bundle.users = settle(users, format!("User statistics {}", month), &mut bundle.failures);
    bundle.prev_sql = settle(prev_sql, format!("SQL statistics {}", prev), &mut bundle.failures);
    bundle.prev_users = settle(
        prev_users,
        format!("User statistics {}", prev),
        &mut bundle.failures,
    );
    bundle
}

fn settle<T>(result: ApiResult<Vec<T>>, what: String, failures: &mut Vec<String>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            warn!(what = %what, error = %e, "Statistics fetch failed");
            failures.push(format!("{}: {}", what, e.banner()));
            Vec::new()
        }
    }
}
