use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use valkey_metrics_collector::{
    AppConfig, CollectorConfig, start_collector,
    config::{SourceConfig, WriterConfig},
    sources::build_source,
    writers::{NdjsonWriter, build_writer},
};

#[test]
fn example_config_is_valid() {
    let cfg = AppConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json")).unwrap();

    let enabled: Vec<&str> = cfg
        .collectors
        .iter()
        .filter(|c| c.enabled)
        .map(|c| c.collector.name.as_str())
        .collect();
    assert_eq!(enabled, vec!["cpu", "memory"]);

    for entry in &cfg.collectors {
        build_source(&entry.collector.name, &entry.source).unwrap();
        build_writer(&entry.collector.name, &entry.writer);
    }
    assert!(matches!(cfg.collectors[2].source, SourceConfig::HttpJson { .. }));
    assert!(matches!(cfg.collectors[2].writer, WriterConfig::Log));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rows_reach_the_file_in_order_without_gaps() {
    let dir = std::env::temp_dir().join(format!("vmc-pipeline-{}", std::process::id()));
    let path = dir.join("seq.ndjson");
    let _ = std::fs::remove_dir_all(&dir);

    let seq = Arc::new(AtomicUsize::new(0));
    let source = {
        let seq = seq.clone();
        Arc::new(move || {
            let first = seq.fetch_add(2, Ordering::SeqCst);
            async move { Ok::<_, anyhow::Error>(vec![json!({ "seq": first }), json!({ "seq": first + 1 })]) }
        })
    };
    let writer = Arc::new(NdjsonWriter::new(&path));

    let handle = start_collector(CollectorConfig::new("seq", 10, 30, 7), source, writer).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    handle.stop();

    // let writes that were already running finish
    tokio::time::sleep(Duration::from_millis(200)).await;

    let content = std::fs::read_to_string(&path).unwrap();
    let written: Vec<u64> = content
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["seq"].as_u64().unwrap())
        .collect();

    assert!(!written.is_empty());
    let expected: Vec<u64> = (0..written.len() as u64).collect();
    assert_eq!(written, expected);

    let snap = handle.metrics().snapshot();
    assert_eq!(snap.rows_written, written.len());
    assert_eq!(snap.write_errors, 0);
    assert!(snap.rows_fetched >= written.len());

    let _ = std::fs::remove_dir_all(&dir);
}
