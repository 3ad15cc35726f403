//! Row writer registry and factory
//!
//! Concrete sinks for flushed batches:
//! - ndjson: append to a JSON-lines file
//! - log:    demo mode, nothing is persisted

pub mod demo;
pub mod ndjson;

use std::sync::Arc;

use crate::collector::RowWriter;
use crate::config::WriterConfig;

pub use demo::LogWriter;
pub use ndjson::NdjsonWriter;

/// Builds the writer declared for collector `name`.
///
/// Files are opened lazily on the first append.
pub fn build_writer(name: &str, cfg: &WriterConfig) -> Arc<dyn RowWriter> {
    match cfg {
        WriterConfig::Ndjson { path } => Arc::new(NdjsonWriter::new(path)),
        WriterConfig::Log => Arc::new(LogWriter::new(name)),
    }
}
