use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{Row, collector::RowWriter};

/// Appends rows to a file, one JSON document per line.
///
/// Behavior:
/// - The file (and its parent directory) is created on first append
/// - One `append_rows` call is one buffered write followed by a flush
/// - Overlapping calls are serialized, so lines from two batches never
///   interleave
/// - After an I/O error the handle is dropped and reopened next time
pub struct NdjsonWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl NdjsonWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> anyhow::Result<File> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }
}

#[async_trait::async_trait]
impl RowWriter for NdjsonWriter {
    async fn append_rows(&self, rows: Vec<Row>) -> anyhow::Result<()> {
        let mut buf = Vec::with_capacity(rows.len() * 64);
        for row in &rows {
            serde_json::to_writer(&mut buf, row)?;
            buf.push(b'\n');
        }

        let mut slot = self.file.lock().await;
        let mut file = match slot.take() {
            Some(file) => file,
            None => self.open().await?,
        };

        let written = async {
            file.write_all(&buf).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            return Err(anyhow::anyhow!("append to {} failed: {e}", self.path.display()));
        }

        *slot = Some(file);
        Ok(())
    }
}
