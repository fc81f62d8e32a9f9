//! Configuration for KOTI

use crate::error::{KotiError, Result};
use std::env;
use std::net::SocketAddr;

/// Main configuration for KOTI
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the home-automation hub
    pub hub_url: String,

    /// Long-poll timeout in seconds
    pub poll_timeout_secs: u64,

    /// Optional JSONL capture to replay instead of polling the hub
    pub replay_file: Option<String>,

    /// Base URL of the search datastore
    pub sink_url: String,

    /// Index documents are written to
    pub sink_index: String,

    /// Optional basic-auth credentials for the sink
    pub sink_username: Option<String>,
    pub sink_password: Option<String>,

    /// Metrics server address
    pub metrics_addr: SocketAddr,

    /// Buffer capacity (number of documents)
    pub buffer_capacity: usize,

    /// Batch size for the sink
    pub batch_size: usize,

    /// Flush interval in milliseconds
    pub flush_interval_ms: u64,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub_url: "http://localhost:8090".to_string(),
            poll_timeout_secs: 30,
            replay_file: None,
            sink_url: "http://localhost:9200".to_string(),
            sink_index: "koti-events".to_string(),
            sink_username: None,
            sink_password: None,
            metrics_addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
            buffer_capacity: 10_000,
            batch_size: 500,
            flush_interval_ms: 1_000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(url) = env::var("KOTI_HUB_URL") {
            config.hub_url = url;
        }

        if let Ok(timeout) = env::var("KOTI_POLL_TIMEOUT_SECS") {
            config.poll_timeout_secs = timeout
                .parse()
                .map_err(|e| KotiError::Config(format!("invalid KOTI_POLL_TIMEOUT_SECS: {e}")))?;
        }

        if let Ok(path) = env::var("KOTI_REPLAY_FILE") {
            config.replay_file = Some(path);
        }

        if let Ok(url) = env::var("KOTI_SINK_URL") {
            config.sink_url = url;
        }

        if let Ok(index) = env::var("KOTI_SINK_INDEX") {
            config.sink_index = index;
        }

        if let Ok(username) = env::var("KOTI_SINK_USERNAME") {
            config.sink_username = Some(username);
        }

        if let Ok(password) = env::var("KOTI_SINK_PASSWORD") {
            config.sink_password = Some(password);
        }

        if let Ok(addr) = env::var("KOTI_METRICS_ADDR") {
            config.metrics_addr = addr
                .parse()
                .map_err(|e| KotiError::Config(format!("invalid KOTI_METRICS_ADDR: {e}")))?;
        }

        if let Ok(cap) = env::var("KOTI_BUFFER_CAPACITY") {
            config.buffer_capacity = cap
                .parse()
                .map_err(|e| KotiError::Config(format!("invalid KOTI_BUFFER_CAPACITY: {e}")))?;
        }

        if let Ok(size) = env::var("KOTI_BATCH_SIZE") {
            config.batch_size = size
                .parse()
                .map_err(|e| KotiError::Config(format!("invalid KOTI_BATCH_SIZE: {e}")))?;
        }

        if let Ok(interval) = env::var("KOTI_FLUSH_INTERVAL_MS") {
            config.flush_interval_ms = interval
                .parse()
                .map_err(|e| KotiError::Config(format!("invalid KOTI_FLUSH_INTERVAL_MS: {e}")))?;
        }

        if let Ok(level) = env::var("KOTI_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = env::var("KOTI_LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(KotiError::Config(format!(
                        "invalid KOTI_LOG_FORMAT: {other} (expected 'json' or 'pretty')"
                    )));
                }
            };
        }

        Ok(config)
    }
}
