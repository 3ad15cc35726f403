use redis::aio::MultiplexedConnection;
use serde_json::json;
use tokio::sync::Mutex;

use crate::{Row, collector::RowSource, util};

/// Samples `INFO [section]` from a Valkey / Redis server.
///
/// Each fetch yields exactly one row:
///
/// ```text
/// { "ts": 1700000000000, "collector": "cpu",
///   "metrics": { "used_cpu_sys": 12.5, ... } }
/// ```
///
/// The connection is opened on the first fetch and reused. Any command
/// error discards it, so the next attempt reconnects.
pub struct ValkeyInfoSource {
    collector: String,
    client: redis::Client,
    section: Option<String>,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl ValkeyInfoSource {
    /// Fails only on a malformed URL.
    pub fn new(collector: &str, url: &str, section: Option<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            collector: collector.to_string(),
            client,
            section,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> anyhow::Result<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.client.get_multiplexed_async_connection().await?;
        log::info!("[{}] connected to valkey", self.collector);
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait::async_trait]
impl RowSource for ValkeyInfoSource {
    async fn fetch(&self) -> anyhow::Result<Vec<Row>> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("INFO");
        if let Some(section) = &self.section {
            cmd.arg(section);
        }

        let raw: String = match cmd.query_async(&mut conn).await {
            Ok(raw) => raw,
            Err(e) => {
                *self.conn.lock().await = None;
                return Err(e.into());
            }
        };

        Ok(vec![info_row(&self.collector, &raw, util::now_ms())])
    }
}

/// Builds the row for one `INFO` reply.
pub fn info_row(collector: &str, raw: &str, ts: i64) -> Row {
    json!({
        "ts": ts,
        "collector": collector,
        "metrics": util::parse_info(raw),
    })
}
