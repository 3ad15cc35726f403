//! Metrics ingestion pipeline for a Valkey / Redis admin console.
//!
//! A collector polls a [`RowSource`] every `poll_ms`, never runs two
//! fetches at once, retries failures with capped backoff and hands
//! batched rows to a [`RowWriter`].
//!
//! - config:    JSON configuration and validation
//! - error:     Error taxonomy
//! - metrics:   Per-collector runtime counters
//! - collector: Scheduling, retry, batching and lifecycle
//! - sources:   Concrete row sources
//! - writers:   Concrete row writers

pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod sources;
pub mod util;
pub mod writers;

pub use collector::{
    CollectorHandle, ErrorHook, RowSource, RowWriter, start_collector, start_collector_with_hook,
};
pub use config::{AppConfig, CollectorConfig, RetryConfig};
pub use error::CollectorError;
pub use metrics::{CollectorMetrics, MetricsSnapshot};

/// One opaque record produced by a fetch. Never inspected by the collector.
pub type Row = serde_json::Value;
