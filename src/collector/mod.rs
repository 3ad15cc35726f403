/// Collector module
///
/// This module groups all logic responsible for:
/// - Firing poll ticks at a fixed cadence
/// - Keeping at most one fetch in flight (busy ticks are dropped)
/// - Retrying failed fetches with capped backoff
/// - Coalescing rows into size/age bounded batches for the writer
/// - Stopping all of the above deterministically
///
/// The collector layer sits between:
/// - A `RowSource` (Valkey INFO, HTTP endpoint, ...)
/// - A `RowWriter` (NDJSON file, log, ...)
///
/// Design notes:
/// - Source and writer specifics MUST NOT live here
/// - One collector owns exactly one polling loop
pub mod backoff;
pub mod batch;
pub mod runner;
pub mod traits;

pub use runner::{CollectorHandle, ErrorHook, start_collector, start_collector_with_hook};
pub use traits::{RowSource, RowWriter};
