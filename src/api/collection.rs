//! Progress stream of a CloudWatch collection job.
//!
//! The backend pushes JSON frames tagged with `type` over
//! `WS /ws/collection/{collection_id}`:
//!
//! ```text
//! {"type": "status", "status": "running", "message": "Fetched 3/12 log streams"}
//! {"type": "log", "message": "orders-prod-1: 1832 events", "level": "info"}
//! {"type": "status", "status": "completed", "message": "Collection finished"}
//! ```
//!
//! [`watch_collection`] owns exactly one connection for one job. It keeps the
//! socket alive with pings, stops on a terminal status, and reconnects a
//! bounded number of times when the stream drops early.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use super::error::ApiResult;

/// Statuses after which the backend sends nothing more for a job.
const TERMINAL_STATUSES: &[&str] = &[
    "completed",
    "complete",
    "success",
    "done",
    "failed",
    "error",
    "cancelled",
];

/// A progress frame emitted by the backend for a collection job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CollectionEvent {
    /// Job state change.
    Status {
        #[serde(default)]
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Completion percentage, when the backend reports one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<f64>,
    },
    /// A line of job output.
    Log {
        #[serde(default)]
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// Any frame type this console does not know about.
    #[serde(other)]
    Other,
}

impl CollectionEvent {
    /// Whether this event ends the job.
    pub fn is_terminal(&self) -> bool {
        match self {
            CollectionEvent::Status { status, .. } => {
                let status = status.to_lowercase();
                TERMINAL_STATUSES.contains(&status.as_str())
            }
            _ => false,
        }
    }

    /// Whether this event reports a failed job.
    pub fn is_failure(&self) -> bool {
        match self {
            CollectionEvent::Status { status, .. } => {
                matches!(status.to_lowercase().as_str(), "failed" | "error" | "cancelled")
            }
            _ => false,
        }
    }
}

/// What the watcher reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// The socket is open. `attempt` is 0 for the first connection.
    Connected { attempt: u32 },
    /// A frame from the backend.
    Event(CollectionEvent),
    /// The stream dropped; another attempt follows after the reconnect delay.
    Reconnecting { attempt: u32, max: u32 },
    /// The job reached a terminal status.
    Finished,
    /// The watcher gave up.
    Failed(String),
}

/// Keepalive and reconnect settings.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub ping_interval: Duration,
    pub max_reconnects: u32,
    pub reconnect_delay: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            max_reconnects: 3,
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

/// How a single connection ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Terminal,
    Closed,
    ReceiverGone,
}

/// Follow one collection job until it finishes, fails, or the consumer leaves.
///
/// Events are delivered in arrival order. After `max_reconnects` consecutive
/// failed reconnects a [`WatchEvent::Failed`] is sent and the task returns.
/// A connection that delivered at least one frame resets the count.
pub async fn watch_collection(url: Url, config: WatchConfig, tx: mpsc::Sender<WatchEvent>) {
    let mut attempt = 0u32;

    loop {
        let mut progressed = false;
        match run_session(&url, &config, attempt, &mut progressed, &tx).await {
            Ok(SessionEnd::Terminal) => {
                info!(url = %url, "Collection job finished");
                let _ = tx.send(WatchEvent::Finished).await;
                return;
            }
            Ok(SessionEnd::ReceiverGone) => {
                debug!(url = %url, "Collection watcher consumer dropped");
                return;
            }
            Ok(SessionEnd::Closed) => {
                warn!(url = %url, attempt, "Collection stream closed before the job finished");
            }
            Err(e) => {
                warn!(url = %url, attempt, error = %e, "Collection stream error");
            }
        }

        if progressed {
            attempt = 0;
        }
        attempt += 1;
        if attempt > config.max_reconnects {
            let _ = tx
                .send(WatchEvent::Failed(format!(
                    "Progress stream lost after {} reconnect attempts",
                    config.max_reconnects
                )))
                .await;
            return;
        }

        if tx
            .send(WatchEvent::Reconnecting {
                attempt,
                max: config.max_reconnects,
            })
            .await
            .is_err()
        {
            return;
        }
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn run_session(
    url: &Url,
    config: &WatchConfig,
    attempt: u32,
    progressed: &mut bool,
    tx: &mpsc::Sender<WatchEvent>,
) -> ApiResult<SessionEnd> {
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    info!(url = %url, attempt, "Connected to collection progress stream");

    if tx.send(WatchEvent::Connected { attempt }).await.is_err() {
        return Ok(SessionEnd::ReceiverGone);
    }

    let (mut sink, mut stream) = ws_stream.split();
    let mut keepalive = tokio::time::interval(config.ping_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    keepalive.tick().await;

    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                sink.send(WsMessage::Ping(Vec::new().into())).await?;
            }
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let event = match serde_json::from_str::<CollectionEvent>(text.as_str()) {
                        Ok(event) => event,
                        Err(e) => {
                            debug!(error = %e, "Ignoring malformed progress frame");
                            continue;
                        }
                    };
                    *progressed = true;
                    let terminal = event.is_terminal();
                    if tx.send(WatchEvent::Event(event)).await.is_err() {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return Ok(SessionEnd::ReceiverGone);
                    }
                    if terminal {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return Ok(SessionEnd::Terminal);
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => return Ok(SessionEnd::Closed),
                // Pong, binary and raw frames carry no progress.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}
