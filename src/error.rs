use thiserror::Error;

/// Errors raised by a collector.
///
/// Only `Config` is ever returned to the caller. `Fetch` and `Write`
/// are recovered inside the polling loop and surface through the log,
/// the per-collector metrics and the optional diagnostics hook.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A fetch attempt was rejected. Retried with backoff.
    #[error("[{collector}] fetch failed (attempt {attempt}): {source}")]
    Fetch {
        collector: String,
        attempt: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The writer rejected a batch. The batch is dropped.
    #[error("[{collector}] write of {rows} rows failed: {source}")]
    Write {
        collector: String,
        rows: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Invalid configuration, detected before anything is scheduled.
    #[error("config error: {0}")]
    Config(String),
}

impl CollectorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
