use std::future::{Future, poll_fn};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Poll;

use futures_util::future::pending;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use super::backoff::Backoff;
use super::batch::BatchBuffer;
use super::traits::{RowSource, RowWriter};
use crate::{
    config::CollectorConfig,
    error::CollectorError,
    metrics::CollectorMetrics,
    Row,
};

/// Diagnostics hook receiving every fetch and write error.
pub type ErrorHook = Arc<dyn Fn(&CollectorError) + Send + Sync>;

type FetchOutput = anyhow::Result<Vec<Row>>;

/// Starts a collector without a diagnostics hook.
///
/// See [`start_collector_with_hook`].
pub fn start_collector(
    config: CollectorConfig,
    source: Arc<dyn RowSource>,
    writer: Arc<dyn RowWriter>,
) -> Result<CollectorHandle, CollectorError> {
    start_collector_with_hook(config, source, writer, None)
}

/// Validates `config` and spawns the polling loop.
///
/// Must be called from within a Tokio runtime.
///
/// The first tick fires one `poll_ms` after start. Invalid
/// configuration is returned as `CollectorError::Config` before
/// anything is spawned.
///
/// Dropping the returned handle does NOT stop the collector; call
/// [`CollectorHandle::stop`].
pub fn start_collector_with_hook(
    config: CollectorConfig,
    source: Arc<dyn RowSource>,
    writer: Arc<dyn RowWriter>,
    hook: Option<ErrorHook>,
) -> Result<CollectorHandle, CollectorError> {
    config.validate()?;

    let gate = Arc::new(Gate::default());
    let metrics = Arc::new(CollectorMetrics::default());

    let writes = spawn_write_loop(
        config.name.clone(),
        writer,
        gate.clone(),
        metrics.clone(),
        hook.clone(),
    );

    let collector = Collector {
        name: config.name.clone(),
        poll: config.poll_interval(),
        source,
        writes,
        buffer: BatchBuffer::new(config.batch_max, config.batch_window()),
        backoff: Backoff::new(&config.retry),
        in_flight: None,
        retry_at: None,
        gate: gate.clone(),
        metrics: metrics.clone(),
        hook,
    };

    info!(
        "[{}] collector started (poll={}ms batch={}ms/{} rows)",
        config.name, config.poll_ms, config.batch_ms, config.batch_max
    );

    let task = tokio::spawn(collector.run()).abort_handle();

    Ok(CollectorHandle {
        name: config.name,
        gate,
        task,
        metrics,
    })
}

/// Handle returned by [`start_collector`].
///
/// `Running --stop()--> Stopped` is terminal. Start a new collector
/// to resume.
pub struct CollectorHandle {
    name: String,
    gate: Arc<Gate>,
    task: AbortHandle,
    metrics: Arc<CollectorMetrics>,
}

impl CollectorHandle {
    /// Stops the collector. Idempotent.
    ///
    /// Once this returns no tick, retry or flush fires again and no new
    /// fetch or write is started. A fetch or write that is already
    /// running finishes on its own, but its result is discarded.
    /// Rows still buffered or queued for the writer are dropped.
    pub fn stop(&self) {
        stop(&self.name, &self.gate, &self.task);
    }

    /// Returns a detached stop function with the same semantics as
    /// [`CollectorHandle::stop`].
    pub fn stopper(&self) -> impl Fn() + Send + Sync + use<> {
        let name = self.name.clone();
        let gate = self.gate.clone();
        let task = self.task.clone();
        move || stop(&name, &gate, &task)
    }

    pub fn is_stopped(&self) -> bool {
        self.gate.is_closed()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<CollectorMetrics> {
        &self.metrics
    }
}

fn stop(name: &str, gate: &Gate, task: &AbortHandle) {
    if gate.close() {
        task.abort();
        info!("[{name}] collector stopped");
    }
}

/// Stop flag shared by the handle and the loop.
///
/// Every fetch launch, flush and write start happens while holding the
/// lock, so none can slip in after `close` returns.
#[derive(Default)]
struct Gate {
    closed: Mutex<bool>,
}

impl Gate {
    /// Runs `launch` unless the gate is closed.
    fn run<T>(&self, launch: impl FnOnce() -> T) -> Option<T> {
        let closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed { None } else { Some(launch()) }
    }

    /// Returns `true` for the call that actually closed the gate.
    fn close(&self) -> bool {
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        !std::mem::replace(&mut *closed, true)
    }

    fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Event {
    FetchDone(Result<FetchOutput, JoinError>),
    Tick,
    Retry,
    FlushDue,
}

/// Polling loop state. Owned by exactly one task.
struct Collector {
    name: String,
    poll: Duration,
    source: Arc<dyn RowSource>,
    // Batches waiting for the write loop
    writes: mpsc::UnboundedSender<Vec<Row>>,
    buffer: BatchBuffer,
    backoff: Backoff,
    // Some(_) while a fetch is running; ticks are dropped meanwhile
    in_flight: Option<JoinHandle<FetchOutput>>,
    retry_at: Option<Instant>,
    gate: Arc<Gate>,
    metrics: Arc<CollectorMetrics>,
    hook: Option<ErrorHook>,
}

impl Collector {
    async fn run(mut self) {
        let mut ticker = time::interval_at(Instant::now() + self.poll, self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let retry_at = self.retry_at;
            let flush_at = self.buffer.deadline();

            let event = tokio::select! {
                biased;

                // A completion is handled before a tick due at the same
                // instant, so that tick can start the next fetch.
                result = wait_fetch(&mut self.in_flight) => Event::FetchDone(result),
                _ = ticker.tick() => Event::Tick,
                _ = sleep_until(retry_at) => Event::Retry,
                _ = sleep_until(flush_at) => Event::FlushDue,
            };

            if self.gate.is_closed() {
                break;
            }

            match event {
                Event::FetchDone(result) => {
                    self.in_flight = None;
                    self.on_fetch_done(result);
                }
                Event::Tick => self.on_tick(),
                Event::Retry => {
                    self.retry_at = None;
                    self.on_retry();
                }
                Event::FlushDue => self.flush("age"),
            }
        }
    }

    fn on_tick(&mut self) {
        CollectorMetrics::incr(&self.metrics.ticks);

        if self.in_flight.is_some() {
            CollectorMetrics::incr(&self.metrics.ticks_dropped);
            debug!("[{}] tick dropped, fetch still in flight", self.name);
            return;
        }

        self.start_fetch();
    }

    fn on_retry(&mut self) {
        if self.in_flight.is_some() {
            debug!("[{}] retry skipped, fetch already in flight", self.name);
            return;
        }

        CollectorMetrics::incr(&self.metrics.retries);
        debug!(
            "[{}] retrying fetch (failures so far: {})",
            self.name,
            self.backoff.failures()
        );
        self.start_fetch();
    }

    fn start_fetch(&mut self) {
        let source = self.source.clone();
        let gate = self.gate.clone();
        let launched = self
            .gate
            .run(|| tokio::spawn(async move { gated_fetch(&gate, source.as_ref()).await }));

        if let Some(handle) = launched {
            CollectorMetrics::incr(&self.metrics.fetches);
            self.in_flight = Some(handle);
        }
    }

    fn on_fetch_done(&mut self, result: Result<FetchOutput, JoinError>) {
        let result = result.unwrap_or_else(|e| Err(anyhow::anyhow!("fetch task failed: {e}")));

        match result {
            Ok(rows) => {
                self.backoff.reset();
                self.retry_at = None;

                CollectorMetrics::add(&self.metrics.rows_fetched, rows.len());
                if self.buffer.push(rows, Instant::now()) {
                    self.flush("size");
                }
            }

            Err(source) => {
                CollectorMetrics::incr(&self.metrics.fetch_errors);

                let delay = self.backoff.next_delay();
                self.retry_at = Some(Instant::now() + delay);

                let err = CollectorError::Fetch {
                    collector: self.name.clone(),
                    attempt: self.backoff.failures(),
                    source,
                };
                warn!("{err} – retry in {}ms", delay.as_millis());
                if let Some(hook) = &self.hook {
                    hook(&err);
                }
            }
        }
    }

    /// Queues the whole buffer for the write loop.
    ///
    /// The buffer is emptied before the write starts, so rows arriving
    /// while the writer is busy go into the next batch.
    fn flush(&mut self, reason: &str) {
        let Some(rows) = self.buffer.take() else {
            return;
        };

        let count = rows.len();
        match self.gate.run(|| self.writes.send(rows)) {
            Some(Ok(())) => {
                CollectorMetrics::incr(&self.metrics.flushes);
                debug!("[{}] flushing {count} rows ({reason})", self.name);
            }
            // write loop is gone, only happens while stopping
            Some(Err(_)) => {
                CollectorMetrics::add(&self.metrics.rows_dropped, count);
            }
            None => {}
        }
    }
}

/// Runs writer calls one at a time, in flush order.
///
/// This loop:
/// - Never blocks the polling loop (the queue is unbounded)
/// - Keeps batch order even when the writer is slower than the batch
///   window
/// - Drops a batch whose append fails (no requeue)
///
/// TERMINATION:
/// - When the collector is stopped, before starting the next batch
/// - When the polling loop is gone and the queue is drained
fn spawn_write_loop(
    name: String,
    writer: Arc<dyn RowWriter>,
    gate: Arc<Gate>,
    metrics: Arc<CollectorMetrics>,
    hook: Option<ErrorHook>,
) -> mpsc::UnboundedSender<Vec<Row>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Row>>();

    tokio::spawn(async move {
        while let Some(rows) = rx.recv().await {
            let count = rows.len();
            let Some(append) = gate.run(|| writer.append_rows(rows)) else {
                break;
            };

            match append.await {
                Ok(()) => {
                    CollectorMetrics::add(&metrics.rows_written, count);
                }
                Err(source) => {
                    CollectorMetrics::incr(&metrics.write_errors);
                    CollectorMetrics::add(&metrics.rows_dropped, count);

                    let err = CollectorError::Write {
                        collector: name.clone(),
                        rows: count,
                        source,
                    };
                    error!("{err} – batch dropped");
                    if let Some(hook) = &hook {
                        hook(&err);
                    }
                }
            }
        }
    });

    tx
}

/// Runs one fetch, polling it for the first time under the gate.
///
/// The fetch body starts on its first poll, so a stop that lands
/// between spawning the task and that poll still prevents the call.
async fn gated_fetch(gate: &Gate, source: &dyn RowSource) -> FetchOutput {
    let mut fetch = source.fetch();

    let first = poll_fn(|cx| Poll::Ready(gate.run(|| fetch.as_mut().poll(cx)))).await;

    match first {
        None => Err(anyhow::anyhow!("collector stopped before fetch started")),
        Some(Poll::Ready(output)) => output,
        Some(Poll::Pending) => fetch.await,
    }
}

async fn wait_fetch(slot: &mut Option<JoinHandle<FetchOutput>>) -> Result<FetchOutput, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => pending().await,
    }
}
