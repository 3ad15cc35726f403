// ------------------------------------------------------------
// Crate layout
// ------------------------------------------------------------
//
// The binary is a thin shell around the library:
//
// - config:     JSON configuration, validated before anything starts
// - sources:    Where rows come from (Valkey INFO, HTTP JSON)
// - writers:    Where batches go (NDJSON file, log)
// - collector:  Polling, retry, batching, stop
//
use std::env;
use std::time::Duration;

use log::{error, info};
use tokio::time::sleep;

use valkey_metrics_collector::{
    AppConfig, CollectorHandle, sources::build_source, start_collector,
    writers::build_writer,
};

const DEFAULT_CONFIG_PATH: &str = "config.json";

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Initialize logging (RUST_LOG, default `info`)
// - Load and validate configuration
// - Start one collector per enabled entry
// - Report collector metrics periodically
// - Stop every collector on Ctrl-C
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // --------------------------------------------------------
    // Load configuration from disk
    //
    // The first CLI argument overrides the default path.
    // --------------------------------------------------------
    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&path)?;
    info!("Loaded {} collector definitions from {}", config.collectors.len(), path);

    // --------------------------------------------------------
    // Build sources and writers for every enabled collector
    //
    // Done for all entries before the first collector starts, so a
    // bad entry aborts startup with nothing running.
    // --------------------------------------------------------
    let mut prepared = Vec::new();

    for entry in config.collectors.iter().filter(|c| c.enabled) {
        let name = &entry.collector.name;
        let source = build_source(name, &entry.source)?;
        let writer = build_writer(name, &entry.writer);
        prepared.push((entry.collector.clone(), source, writer));
    }

    // --------------------------------------------------------
    // Start all enabled collectors
    //
    // Fetch and write errors never stop a collector; they are
    // logged and counted in its metrics.
    // --------------------------------------------------------
    let mut handles: Vec<CollectorHandle> = Vec::new();

    for (collector, source, writer) in prepared {
        handles.push(start_collector(collector, source, writer)?);
    }

    if handles.is_empty() {
        error!("No enabled collectors in {}", path);
        return Ok(());
    }

    // --------------------------------------------------------
    // Metrics reporter (periodic, low-noise)
    // --------------------------------------------------------
    let report_every = Duration::from_secs(config.report_interval_secs);

    loop {
        tokio::select! {
            _ = sleep(report_every) => {
                for handle in &handles {
                    info!("[METRICS] {} {}", handle.name(), handle.metrics().snapshot());
                }
            }

            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    // --------------------------------------------------------
    // Shutdown
    //
    // Stop is synchronous; running fetches and writes finish on
    // their own, buffered rows are dropped.
    // --------------------------------------------------------
    for handle in &handles {
        handle.stop();
        info!("[METRICS] {} final {}", handle.name(), handle.metrics().snapshot());
    }

    Ok(())
}
