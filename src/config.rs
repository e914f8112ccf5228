//! Layered settings.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. `SLOWQUERY_*` environment variables, e.g. `SLOWQUERY_API_BASE_URL`
//! 4. command-line flags
//!
//! ```toml
//! api_base_url = "http://dashboard-backend:8000"
//! request_timeout = "30s"
//! status_refresh = "10s"
//! query_refresh = "30s"
//! query_page_size = 20
//! ws_max_reconnects = 3
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};

use crate::api::{ApiConfig, WatchConfig};
use crate::app::AppConfig;
use crate::data::duration::parse_duration;
use crate::logging::DEFAULT_LOG_FILE;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SLOWQUERY";

/// Every setting, as read from the layered sources.
///
/// Intervals are kept as strings like `"10s"` and parsed on conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout: String,
    /// Monitor status polling interval.
    pub status_refresh: String,
    /// Slow query list polling interval while the monitor runs.
    pub query_refresh: String,
    pub query_page_size: u32,
    pub plan_page_size: u32,
    pub digest_page_size: u32,
    pub ws_ping_interval: String,
    pub ws_max_reconnects: u32,
    pub ws_reconnect_delay: String,
    pub aws_info_attempts: u32,
    pub aws_info_retry_delay: String,
    /// Where markdown EXPLAIN reports are saved.
    pub download_dir: PathBuf,
    pub log_file: PathBuf,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub log_file: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from every source.
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::build(config_file, None, overrides)
    }

    /// `env` replaces the process environment when given.
    fn build(
        config_file: Option<&Path>,
        env: Option<Map<String, String>>,
        overrides: &Overrides,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("api_base_url", "http://localhost:8000")?
            .set_default("request_timeout", "30s")?
            .set_default("status_refresh", "10s")?
            .set_default("query_refresh", "30s")?
            .set_default("query_page_size", 20)?
            .set_default("plan_page_size", 5)?
            .set_default("digest_page_size", 15)?
            .set_default("ws_ping_interval", "20s")?
            .set_default("ws_max_reconnects", 3)?
            .set_default("ws_reconnect_delay", "2s")?
            .set_default("aws_info_attempts", 3)?
            .set_default("aws_info_retry_delay", "1s")?
            .set_default("download_dir", ".")?
            .set_default("log_file", DEFAULT_LOG_FILE)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true).source(env))
            .set_override_option("api_base_url", overrides.api_base_url.clone())?
            .set_override_option(
                "log_file",
                overrides.log_file.as_ref().map(|p| p.display().to_string()),
            )?
            .set_override_option(
                "download_dir",
                overrides.download_dir.as_ref().map(|p| p.display().to_string()),
            )?;

        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("query_page_size", self.query_page_size),
            ("plan_page_size", self.plan_page_size),
            ("digest_page_size", self.digest_page_size),
            ("aws_info_attempts", self.aws_info_attempts),
        ] {
            if value == 0 {
                bail!("{} must be at least 1", name);
            }
        }
        for (name, value) in [
            ("request_timeout", &self.request_timeout),
            ("status_refresh", &self.status_refresh),
            ("query_refresh", &self.query_refresh),
            ("ws_ping_interval", &self.ws_ping_interval),
            ("ws_reconnect_delay", &self.ws_reconnect_delay),
            ("aws_info_retry_delay", &self.aws_info_retry_delay),
        ] {
            interval(name, value)?;
        }
        Ok(())
    }

    pub fn api_config(&self) -> Result<ApiConfig> {
        Ok(ApiConfig {
            base_url: self.api_base_url.clone(),
            timeout: interval("request_timeout", &self.request_timeout)?,
            aws_info_attempts: self.aws_info_attempts,
            retry_delay: interval("aws_info_retry_delay", &self.aws_info_retry_delay)?,
        })
    }

    pub fn watch_config(&self) -> Result<WatchConfig> {
        Ok(WatchConfig {
            ping_interval: interval("ws_ping_interval", &self.ws_ping_interval)?,
            max_reconnects: self.ws_max_reconnects,
            reconnect_delay: interval("ws_reconnect_delay", &self.ws_reconnect_delay)?,
        })
    }

    pub fn app_config(&self) -> Result<AppConfig> {
        Ok(AppConfig {
            status_refresh: interval("status_refresh", &self.status_refresh)?,
            query_refresh: interval("query_refresh", &self.query_refresh)?,
            query_page_size: self.query_page_size,
            plan_page_size: self.plan_page_size,
            digest_page_size: self.digest_page_size,
            download_dir: self.download_dir.clone(),
        })
    }
}

fn interval(name: &str, value: &str) -> Result<Duration> {
    let duration = parse_duration(value).with_context(|| format!("Invalid {}", name))?;
    if duration.is_zero() {
        bail!("{} must be greater than zero", name);
    }
    Ok(duration)
}
