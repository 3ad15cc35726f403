use crate::{Row, collector::RowWriter};

/// Demo writer: logs batches instead of persisting them.
///
/// Never fails. Useful for checking a source before pointing it at
/// real storage.
pub struct LogWriter {
    collector: String,
}

impl LogWriter {
    pub fn new(collector: &str) -> Self {
        Self {
            collector: collector.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RowWriter for LogWriter {
    async fn append_rows(&self, rows: Vec<Row>) -> anyhow::Result<()> {
        log::info!("[{}] DEMO → batch of {} rows", self.collector, rows.len());
        for row in &rows {
            log::debug!("[{}] {}", self.collector, row);
        }
        Ok(())
    }
}
