use std::future::Future;

use crate::Row;

/// RowSource is the seam between the polling loop and whatever it polls.
///
/// Each implementation must:
/// - Produce the rows of one sample per call
/// - Fail the whole call instead of returning partial rows
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - Every fetch runs in its own task, the source is shared via `Arc`
///
/// The collector guarantees that `fetch` is never called while a
/// previous call is still running.
///
/// Any `Fn() -> Future<Output = anyhow::Result<Vec<Row>>>` closure is
/// a RowSource.
#[async_trait::async_trait]
pub trait RowSource: Send + Sync + 'static {
    async fn fetch(&self) -> anyhow::Result<Vec<Row>>;
}

#[async_trait::async_trait]
impl<F, Fut> RowSource for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<Row>>> + Send + 'static,
{
    async fn fetch(&self) -> anyhow::Result<Vec<Row>> {
        (self)().await
    }
}

/// RowWriter persists flushed batches.
///
/// CONTRACT:
/// - `rows` is never empty
/// - Rows are in fetch-completion order
/// - Calls never overlap; batches queue up while a call is running
///
/// A failed append drops the batch; the collector does not requeue it.
#[async_trait::async_trait]
pub trait RowWriter: Send + Sync + 'static {
    async fn append_rows(&self, rows: Vec<Row>) -> anyhow::Result<()>;
}
