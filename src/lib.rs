//! # slowquery-console
//!
//! A terminal dashboard for MySQL/Aurora slow queries, CloudWatch slow log
//! collection, RDS inventory and EXPLAIN plans.
//!
//! The console is a thin client: every figure it shows comes from the slow
//! query backend over HTTP, and CloudWatch collection progress arrives over
//! a WebSocket. Nothing is computed from raw data locally.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Application                          │
//! │  ┌─────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐ │
//! │  │  app    │───▶│   data   │───▶│    ui    │───▶│ Terminal │ │
//! │  │ (state) │    │ (helpers)│    │(rendering)    │          │ │
//! │  └────┬────┘    └──────────┘    └──────────┘    └──────────┘ │
//! │       │ Request ▲ Reply                                      │
//! │       ▼         │                                            │
//! │  ┌─────────┐    ┌─────────┐                                  │
//! │  │ source  │───▶│   api   │◀── HTTP / WebSocket backend      │
//! │  │ (queue) │    │(client) │                                  │
//! │  └─────────┘    └─────────┘                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: application state, view navigation and user actions
//! - **[`source`]**: the [`DataSource`] trait the synchronous UI loop talks
//!   to, with [`BackendSource`] (tokio tasks) and [`ChannelSource`] (fed by hand)
//! - **[`api`]**: REST client ([`ApiClient`]), payload types and the
//!   collection progress WebSocket
//! - **[`data`]**: pagination, EXPLAIN plan parsing, months, statistics
//!   filters and display formatting
//! - **[`ui`]**: ratatui rendering of the five views and their overlays
//! - **[`config`]**, **[`logging`]**: layered settings and file logging
//! - **[`export`]**: non-interactive JSON snapshot
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Dashboard against a backend
//! slowquery-console --api-url http://localhost:8000
//!
//! # Snapshot to JSON without starting the dashboard
//! slowquery-console --export snapshot.json --month 2025-01
//! ```
//!
//! ### As a library with a channel source
//!
//! ```
//! use slowquery_console::app::AppConfig;
//! use slowquery_console::source::{Reply, Update};
//! use slowquery_console::api::AwsInfo;
//! use slowquery_console::{App, ChannelSource};
//!
//! let (tx, source) = ChannelSource::create("memory");
//! let mut app = App::new(Box::new(source), AppConfig::default());
//!
//! tx.send(Reply::event(Update::AwsInfo(Ok(AwsInfo {
//!     account: "123456789012".to_string(),
//!     region: "ap-northeast-2".to_string(),
//! }))))
//! .unwrap();
//! app.tick();
//! assert_eq!(app.aws.as_ref().map(|a| a.region.as_str()), Some("ap-northeast-2"));
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod data;
pub mod events;
pub mod export;
pub mod logging;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use api::{ApiClient, ApiConfig, ApiError};
pub use app::App;
pub use source::{BackendSource, ChannelSource, DataSource};
