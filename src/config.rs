use std::{env, time::Duration};

/// Configuration loaded from environment variables
///
/// Every field has a default so the dashboard starts against a local indexer
/// (`http://localhost:3000`) without any `.env` file.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the indexer HTTP server
    pub indexer_url: String,

    /// Timeout for the snapshot request and for opening the stream
    pub request_timeout: Duration,

    /// Silence on an open stream after which it is dropped and reopened
    pub stream_idle_timeout: Duration,

    /// Reconnect attempts before the stream gives up
    pub stream_max_retries: u32,

    /// First reconnect delay, doubled on every failed attempt
    pub stream_retry_delay: Duration,

    /// Upper bound for the reconnect delay
    pub stream_max_retry_delay: Duration,

    /// Maximum bytes buffered for a single SSE line
    pub stream_buffer_limit: usize,

    /// Capacity of the delivery channel between bridge and store
    pub event_channel_buffer: usize,

    /// Number of most recent blocks shown in charts
    pub chart_block_limit: usize,

    /// Rows shown in the transfers table
    pub table_row_limit: usize,

    /// Replay transfers from this JSON file instead of the indexer
    pub replay_file: Option<String>,

    /// Delay between replayed live events
    pub replay_interval: Duration,

    pub rust_log: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `INDEXER_URL` (default: http://localhost:3000)
    /// - `REQUEST_TIMEOUT_SECS` (default: 60)
    /// - `STREAM_IDLE_TIMEOUT_SECS` (default: 60)
    /// - `STREAM_MAX_RETRIES` (default: 10)
    /// - `STREAM_RETRY_DELAY_SECS` (default: 2)
    /// - `STREAM_MAX_RETRY_DELAY_SECS` (default: 30)
    /// - `STREAM_BUFFER_LIMIT` (default: 1048576)
    /// - `EVENT_CHANNEL_BUFFER` (default: 1000)
    /// - `CHART_BLOCK_LIMIT` (default: 5)
    /// - `TABLE_ROW_LIMIT` (default: 50)
    /// - `REPLAY_FILE` (default: unset)
    /// - `REPLAY_INTERVAL_MS` (default: 1000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };

        let indexer_url = lookup("INDEXER_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        Self {
            indexer_url,
            request_timeout: Duration::from_secs(number("REQUEST_TIMEOUT_SECS", 60)),
            stream_idle_timeout: Duration::from_secs(number("STREAM_IDLE_TIMEOUT_SECS", 60).max(1)),
            stream_max_retries: number("STREAM_MAX_RETRIES", 10) as u32,
            stream_retry_delay: Duration::from_secs(number("STREAM_RETRY_DELAY_SECS", 2)),
            stream_max_retry_delay: Duration::from_secs(number("STREAM_MAX_RETRY_DELAY_SECS", 30)),
            stream_buffer_limit: number("STREAM_BUFFER_LIMIT", 1024 * 1024) as usize,
            event_channel_buffer: number("EVENT_CHANNEL_BUFFER", 1_000).max(1) as usize,
            chart_block_limit: number("CHART_BLOCK_LIMIT", 5).max(1) as usize,
            table_row_limit: number("TABLE_ROW_LIMIT", 50) as usize,
            replay_file: lookup("REPLAY_FILE").filter(|s| !s.trim().is_empty()),
            replay_interval: Duration::from_millis(number("REPLAY_INTERVAL_MS", 1_000)),
            rust_log: lookup("RUST_LOG"),
        }
    }

    pub fn snapshot_url(&self) -> String {
        format!("{}/transfers", self.indexer_url)
    }

    pub fn stream_url(&self) -> String {
        format!("{}/transfers/stream", self.indexer_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.indexer_url, "http://localhost:3000");
        assert_eq!(config.snapshot_url(), "http://localhost:3000/transfers");
        assert_eq!(config.stream_url(), "http://localhost:3000/transfers/stream");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(60));
        assert_eq!(config.stream_max_retries, 10);
        assert_eq!(config.stream_retry_delay, Duration::from_secs(2));
        assert_eq!(config.stream_buffer_limit, 1024 * 1024);
        assert_eq!(config.event_channel_buffer, 1_000);
        assert_eq!(config.chart_block_limit, 5);
        assert_eq!(config.table_row_limit, 50);
        assert!(config.replay_file.is_none());
    }

    #[test]
    fn test_custom_config() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("INDEXER_URL", "http://indexer.local:8080/"),
            ("STREAM_MAX_RETRIES", "3"),
            ("STREAM_IDLE_TIMEOUT_SECS", "0"),
            ("CHART_BLOCK_LIMIT", "8"),
            ("EVENT_CHANNEL_BUFFER", "0"),
            ("REPLAY_FILE", "transfers.json"),
            ("REPLAY_INTERVAL_MS", "250"),
            ("TABLE_ROW_LIMIT", "not-a-number"),
        ]);

        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.indexer_url, "http://indexer.local:8080");
        assert_eq!(config.stream_url(), "http://indexer.local:8080/transfers/stream");
        assert_eq!(config.stream_max_retries, 3);
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(1));
        assert_eq!(config.chart_block_limit, 8);
        assert_eq!(config.event_channel_buffer, 1);
        assert_eq!(config.replay_file.as_deref(), Some("transfers.json"));
        assert_eq!(config.replay_interval, Duration::from_millis(250));
        assert_eq!(config.table_row_limit, 50);
    }
}
