//! Row source registry and factory
//!
//! This module provides:
//! - The concrete sources a collector can poll
//! - A factory resolving a `SourceConfig` into a `RowSource`
//!
//! The collector itself only ever sees `Arc<dyn RowSource>`.

pub mod http;
pub mod valkey;

use std::sync::Arc;

use crate::collector::RowSource;
use crate::config::SourceConfig;

pub use http::HttpJsonSource;
pub use valkey::ValkeyInfoSource;

/// Builds the source declared for collector `name`.
///
/// No network I/O happens here; connections are opened on first fetch.
pub fn build_source(name: &str, cfg: &SourceConfig) -> anyhow::Result<Arc<dyn RowSource>> {
    let source: Arc<dyn RowSource> = match cfg {
        SourceConfig::ValkeyInfo { url, section } => {
            Arc::new(ValkeyInfoSource::new(name, url, section.clone())?)
        }
        SourceConfig::HttpJson { url } => Arc::new(HttpJsonSource::new(url)?),
    };
    Ok(source)
}
