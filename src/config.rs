use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::CollectorError;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Top-level structure loaded from `config.json`.
//
// It defines:
// - The collectors to run (one polling loop each)
// - How often runtime metrics are reported
//
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Collector definitions, started in order
    pub collectors: Vec<CollectorEntry>,

    /// Interval of the periodic metrics report, in seconds
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

fn default_report_interval_secs() -> u64 {
    10
}

impl AppConfig {
    /// Reads a JSON configuration file and validates every enabled
    /// collector. Nothing is started if any entry is invalid.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            CollectorError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = serde_json::from_str(data)
            .map_err(|e| CollectorError::config(format!("invalid config json: {e}")))?;

        if cfg.report_interval_secs == 0 {
            return Err(CollectorError::config("report_interval_secs must be positive").into());
        }

        for entry in cfg.collectors.iter().filter(|c| c.enabled) {
            entry.collector.validate()?;
            entry.source.validate(&entry.collector.name)?;
            entry.writer.validate(&entry.collector.name)?;
        }

        Ok(cfg)
    }
}

// ------------------------------------------------------------
// Collector entry
// ------------------------------------------------------------
//
// One polling loop as declared in the file: the timing knobs plus
// the source it polls and the sink it writes to.
//
#[derive(Debug, Deserialize, Clone)]
pub struct CollectorEntry {
    /// Enables or disables this collector at startup
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(flatten)]
    pub collector: CollectorConfig,

    pub source: SourceConfig,

    pub writer: WriterConfig,
}

fn default_enabled() -> bool {
    true
}

// ------------------------------------------------------------
// Collector timing
// ------------------------------------------------------------
//
// IMPORTANT:
// - All intervals are milliseconds and must be positive.
// - `batch_max` bounds the number of rows per writer call
//   (a single oversized fetch is still written whole).
//
#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    /// Diagnostic label, used in logs and errors only
    pub name: String,

    /// Polling interval
    pub poll_ms: u64,

    /// Maximum age of a non-empty batch before it is flushed
    pub batch_ms: u64,

    /// Row count that triggers an immediate flush
    pub batch_max: usize,

    /// Fetch retry backoff
    #[serde(default)]
    pub retry: RetryConfig,
}

impl CollectorConfig {
    pub fn new(name: impl Into<String>, poll_ms: u64, batch_ms: u64, batch_max: usize) -> Self {
        Self {
            name: name.into(),
            poll_ms,
            batch_ms,
            batch_max,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_ms)
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.name.trim().is_empty() {
            return Err(CollectorError::config("collector name must not be empty"));
        }
        if self.poll_ms == 0 {
            return Err(CollectorError::config(format!(
                "[{}] poll_ms must be positive",
                self.name
            )));
        }
        if self.batch_ms == 0 {
            return Err(CollectorError::config(format!(
                "[{}] batch_ms must be positive",
                self.name
            )));
        }
        if self.batch_max == 0 {
            return Err(CollectorError::config(format!(
                "[{}] batch_max must be positive",
                self.name
            )));
        }
        self.retry.validate(&self.name)
    }
}

// ------------------------------------------------------------
// Retry configuration
// ------------------------------------------------------------
//
// Capped exponential backoff: initial_ms, 2*initial_ms, ... up to
// max_ms, plus a uniform random jitter in [0, jitter_ms].
//
// A jitter of 0 keeps retry timing fully deterministic.
//
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_retry_initial_ms")]
    pub initial_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub max_ms: u64,

    #[serde(default)]
    pub jitter_ms: u64,
}

fn default_retry_initial_ms() -> u64 {
    250
}

fn default_retry_max_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_retry_initial_ms(),
            max_ms: default_retry_max_ms(),
            jitter_ms: 0,
        }
    }
}

impl RetryConfig {
    fn validate(&self, name: &str) -> Result<(), CollectorError> {
        if self.initial_ms == 0 {
            return Err(CollectorError::config(format!(
                "[{name}] retry.initial_ms must be positive"
            )));
        }
        if self.initial_ms > self.max_ms {
            return Err(CollectorError::config(format!(
                "[{name}] retry.initial_ms ({}) exceeds retry.max_ms ({})",
                self.initial_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

// ------------------------------------------------------------
// Source configuration
// ------------------------------------------------------------
//
// Where rows come from. Resolved to a `RowSource` in `sources`.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// `INFO <section>` against a Valkey / Redis server
    ValkeyInfo {
        url: String,
        #[serde(default)]
        section: Option<String>,
    },

    /// GET a monitoring endpoint returning JSON
    HttpJson { url: String },
}

impl SourceConfig {
    fn validate(&self, name: &str) -> Result<(), CollectorError> {
        let url = match self {
            SourceConfig::ValkeyInfo { url, .. } | SourceConfig::HttpJson { url } => url,
        };
        if url.trim().is_empty() {
            return Err(CollectorError::config(format!("[{name}] source url is empty")));
        }

        // parse only, nothing is connected here
        match self {
            SourceConfig::ValkeyInfo { url, .. } => {
                redis::Client::open(url.as_str()).map_err(|e| {
                    CollectorError::config(format!("[{name}] invalid valkey url {url:?}: {e}"))
                })?;
            }
            SourceConfig::HttpJson { url } => {
                reqwest::Url::parse(url).map_err(|e| {
                    CollectorError::config(format!("[{name}] invalid http url {url:?}: {e}"))
                })?;
            }
        }
        Ok(())
    }
}

// ------------------------------------------------------------
// Writer configuration
// ------------------------------------------------------------
//
// Where batches go. Resolved to a `RowWriter` in `writers`.
//
// NOTE:
// - `log` writes nowhere and is meant for local testing.
//
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriterConfig {
    /// Append rows as JSON lines to a file
    Ndjson { path: String },

    /// Log batches instead of persisting them
    Log,
}

impl WriterConfig {
    fn validate(&self, name: &str) -> Result<(), CollectorError> {
        if let WriterConfig::Ndjson { path } = self {
            if path.trim().is_empty() {
                return Err(CollectorError::config(format!("[{name}] writer path is empty")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "collectors": [
            {
                "name": "cpu",
                "poll_ms": 1000,
                "batch_ms": 5000,
                "batch_max": 100,
                "retry": { "initial_ms": 100, "max_ms": 2000, "jitter_ms": 25 },
                "source": { "kind": "valkey_info", "url": "redis://127.0.0.1:6379", "section": "cpu" },
                "writer": { "kind": "ndjson", "path": "data/cpu.ndjson" }
            },
            {
                "name": "memory",
                "enabled": false,
                "poll_ms": 0,
                "batch_ms": 0,
                "batch_max": 0,
                "source": { "kind": "http_json", "url": "" },
                "writer": { "kind": "log" }
            }
        ]
    }"#;

    #[test]
    fn loads_sample_and_skips_disabled_entries() {
        let cfg = AppConfig::from_json(SAMPLE).unwrap();
        assert_eq!(cfg.collectors.len(), 2);
        assert_eq!(cfg.report_interval_secs, 10);

        let cpu = &cfg.collectors[0];
        assert!(cpu.enabled);
        assert_eq!(cpu.collector.name, "cpu");
        assert_eq!(cpu.collector.poll_interval(), Duration::from_secs(1));
        assert_eq!(
            cpu.collector.retry,
            RetryConfig { initial_ms: 100, max_ms: 2000, jitter_ms: 25 }
        );
        assert!(matches!(
            &cpu.source,
            SourceConfig::ValkeyInfo { section: Some(s), .. } if s == "cpu"
        ));
        assert!(matches!(&cpu.writer, WriterConfig::Ndjson { path } if path == "data/cpu.ndjson"));

        // invalid but disabled
        assert!(!cfg.collectors[1].enabled);
    }

    #[test]
    fn retry_defaults_apply_when_omitted() {
        let cfg: CollectorConfig = serde_json::from_str(
            r#"{ "name": "x", "poll_ms": 50, "batch_ms": 100, "batch_max": 10 }"#,
        )
        .unwrap();
        assert_eq!(cfg.retry, RetryConfig::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_values() {
        let base = CollectorConfig::new("cpu", 50, 100, 10);

        for bad in [
            CollectorConfig { poll_ms: 0, ..base.clone() },
            CollectorConfig { batch_ms: 0, ..base.clone() },
            CollectorConfig { batch_max: 0, ..base.clone() },
            CollectorConfig { name: "  ".into(), ..base.clone() },
            base.clone().with_retry(RetryConfig { initial_ms: 0, ..RetryConfig::default() }),
            base.clone().with_retry(RetryConfig { initial_ms: 10_000, max_ms: 100, jitter_ms: 0 }),
        ] {
            assert!(
                matches!(bad.validate(), Err(CollectorError::Config(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn rejects_enabled_entry_with_bad_source() {
        let json = r#"{
            "collectors": [{
                "name": "info", "poll_ms": 10, "batch_ms": 10, "batch_max": 1,
                "source": { "kind": "http_json", "url": " " },
                "writer": { "kind": "log" }
            }]
        }"#;
        let err = AppConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("source url is empty"));
    }

    #[test]
    fn rejects_malformed_source_urls() {
        for (kind, url) in [("valkey_info", "not a url"), ("http_json", "::nope::")] {
            let json = format!(
                r#"{{
                    "collectors": [
                        {{
                            "name": "ok", "poll_ms": 10, "batch_ms": 10, "batch_max": 1,
                            "source": {{ "kind": "http_json", "url": "http://127.0.0.1:9121/" }},
                            "writer": {{ "kind": "log" }}
                        }},
                        {{
                            "name": "broken", "poll_ms": 10, "batch_ms": 10, "batch_max": 1,
                            "source": {{ "kind": "{kind}", "url": "{url}" }},
                            "writer": {{ "kind": "log" }}
                        }}
                    ]
                }}"#
            );
            let err = AppConfig::from_json(&json).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<CollectorError>(), Some(CollectorError::Config(_))),
                "{kind}: {err}"
            );
            assert!(err.to_string().contains("[broken] invalid"), "{err}");
        }
    }

    #[test]
    fn rejects_unknown_kinds() {
        let json = r#"{
            "collectors": [{
                "name": "info", "poll_ms": 10, "batch_ms": 10, "batch_max": 1,
                "source": { "kind": "carrier_pigeon" },
                "writer": { "kind": "log" }
            }]
        }"#;
        let err = AppConfig::from_json(json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CollectorError>(),
            Some(CollectorError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = AppConfig::load("/definitely/not/here/config.json").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
