use crate::config::PersistenceConfig;
use crate::error::{ShutdownError, StoreError, WriterError};
use crate::queue::{BoundedQueue, Enqueued};
use crate::record::LogRecord;
use crate::row::rows_for_batch;
use crate::store::LogStore;
use crate::INTERNAL_TARGET;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, warn};

/// Lifecycle of a [`BatchWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriterState {
    Disconnected,
    Connected,
    Closing,
    Closed,
}

const RUNNING: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// Point-in-time counters of a [`BatchWriter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Records committed to the store.
    pub written: u64,
    /// Records lost to connect or insert failures.
    pub failed: u64,
    /// Records evicted from the queue by newer ones.
    pub dropped: u64,
    pub queue_depth: usize,
    pub connected: bool,
}

/// State shared between producers, the writer task and stats readers.
struct Shared {
    queue: BoundedQueue<LogRecord>,
    stop: AtomicBool,
    lifecycle: AtomicU8,
    connected: AtomicBool,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    /// Records taken off the queue by the task but not yet counted as
    /// written or failed.
    in_flight: AtomicU64,
}

/// Background writer that drains a [`BoundedQueue`] into a [`LogStore`].
///
/// Producers call [`enqueue`](Self::enqueue), which never blocks and
/// evicts the oldest record when the queue is full. A single Tokio task
/// owns the store and the in-flight batch. It writes a batch when it
/// reaches the configured size or when the flush interval passes with a
/// partial batch pending.
///
/// Connectivity problems never reach producers: a batch that cannot be
/// written is dropped and counted in [`WriterStats::failed`]. Each batch
/// gets at most one reconnect attempt, so loss during an outage is
/// bounded by the queue capacity plus one batch.
pub struct BatchWriter {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

struct LoopOptions {
    batch_size: usize,
    flush_interval: Duration,
    connect_timeout: Duration,
}

impl BatchWriter {
    /// Create the queue and spawn the writer task on the current Tokio
    /// runtime.
    ///
    /// The task makes one connection attempt straight away; if it fails
    /// the writer starts out disconnected and retries before the next
    /// batch.
    ///
    /// **Errors**
    /// - [`WriterError::Config`] for an invalid [`PersistenceConfig`].
    /// - [`WriterError::NoRuntime`] when called outside a Tokio runtime.
    pub fn spawn<S>(store: S, config: &PersistenceConfig) -> Result<Self, WriterError>
    where
        S: LogStore + 'static,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| WriterError::NoRuntime)?;

        let shared = Arc::new(Shared {
            queue: BoundedQueue::new(config.queue_capacity),
            stop: AtomicBool::new(false),
            lifecycle: AtomicU8::new(RUNNING),
            connected: AtomicBool::new(false),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
        });

        let options = LoopOptions {
            batch_size: config.effective_batch_size(),
            flush_interval: config.flush_interval,
            connect_timeout: config.connect_timeout,
        };

        let handle = runtime.spawn(run(store, Arc::clone(&shared), options));

        Ok(BatchWriter {
            shared,
            handle: Mutex::new(Some(handle)),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Queue a record for persistence without blocking.
    ///
    /// Returns `false` if the writer is closing or closed and the record
    /// was discarded.
    pub fn enqueue(&self, record: LogRecord) -> bool {
        match self.shared.queue.enqueue(record) {
            Enqueued::Accepted => true,
            Enqueued::Evicted(_) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Enqueued::Rejected(_) => false,
        }
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            written: self.shared.written.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            queue_depth: self.shared.queue.len(),
            connected: self.shared.connected.load(Ordering::Acquire),
        }
    }

    pub fn state(&self) -> WriterState {
        match self.shared.lifecycle.load(Ordering::Acquire) {
            CLOSING => WriterState::Closing,
            CLOSED => WriterState::Closed,
            _ if self.shared.connected.load(Ordering::Acquire) => WriterState::Connected,
            _ => WriterState::Disconnected,
        }
    }

    /// Copies of the records currently waiting in the queue, oldest first.
    pub fn pending(&self) -> Vec<LogRecord> {
        self.shared.queue.snapshot()
    }

    /// Stop the writer and release the store.
    ///
    /// New records are rejected from this point on. The writer task
    /// drains what is already queued, writes it best-effort, and closes
    /// its connection. If it does not finish within the configured
    /// shutdown timeout the task is aborted. Either way the writer ends
    /// up [`WriterState::Closed`].
    pub async fn shutdown(&self) -> Result<WriterStats, ShutdownError> {
        if self
            .shared
            .lifecycle
            .compare_exchange(RUNNING, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ShutdownError::AlreadyClosed);
        }

        self.shared.stop.store(true, Ordering::Release);
        self.shared.queue.close();

        let handle = self.handle.lock().take();
        let result = match handle {
            Some(mut handle) => {
                let joined = timeout(self.shutdown_timeout, &mut handle).await;
                match joined {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(ShutdownError::Panicked),
                    Err(_) => {
                        handle.abort();
                        // cancelled at its next await point
                        let _ = handle.await;
                        let lost = self.discard_unwritten();
                        warn!(
                            target: INTERNAL_TARGET,
                            timeout = ?self.shutdown_timeout,
                            lost,
                            "batch writer did not stop in time, aborting"
                        );
                        Err(ShutdownError::Timeout(self.shutdown_timeout))
                    }
                }
            }
            None => Ok(()),
        };

        self.shared.connected.store(false, Ordering::Release);
        self.shared.lifecycle.store(CLOSED, Ordering::Release);
        result.map(|()| self.stats())
    }

    /// Count everything the aborted task still held, plus whatever is left
    /// in the queue, as failed.
    fn discard_unwritten(&self) -> u64 {
        let mut lost = self.shared.in_flight.swap(0, Ordering::AcqRel);
        while self.shared.queue.try_dequeue().is_some() {
            lost += 1;
        }
        self.shared.failed.fetch_add(lost, Ordering::Relaxed);
        lost
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        // Let a still-running task drain and exit on its own.
        self.shared.stop.store(true, Ordering::Release);
        self.shared.queue.close();
    }
}

async fn run<S: LogStore>(mut store: S, shared: Arc<Shared>, options: LoopOptions) {
    match connect(&mut store, options.connect_timeout).await {
        Ok(()) => shared.connected.store(true, Ordering::Release),
        Err(e) => warn!(
            target: INTERNAL_TARGET,
            store = %store.describe(),
            error = %e,
            "initial connection to log store failed, will retry before next batch"
        ),
    }

    let mut batch: Vec<LogRecord> = Vec::with_capacity(options.batch_size);
    let mut batch_started: Option<Instant> = None;

    while !shared.stop.load(Ordering::Acquire) {
        let wait = match batch_started {
            Some(started) => options.flush_interval.saturating_sub(started.elapsed()),
            None => options.flush_interval,
        };

        match shared.queue.dequeue_or_wait(wait).await {
            Some(record) => {
                batch_started.get_or_insert_with(Instant::now);
                shared.in_flight.fetch_add(1, Ordering::AcqRel);
                batch.push(record);
                let expired = batch_started
                    .map(|started| started.elapsed() >= options.flush_interval)
                    .unwrap_or(false);
                if batch.len() >= options.batch_size || expired {
                    write_batch(&mut store, &shared, &mut batch, options.connect_timeout).await;
                    batch_started = None;
                }
            }
            None => {
                if !batch.is_empty() {
                    write_batch(&mut store, &shared, &mut batch, options.connect_timeout).await;
                    batch_started = None;
                }
            }
        }
    }

    // Best-effort drain of whatever was queued before the stop signal.
    while let Some(record) = shared.queue.try_dequeue() {
        shared.in_flight.fetch_add(1, Ordering::AcqRel);
        batch.push(record);
        if batch.len() >= options.batch_size {
            write_batch(&mut store, &shared, &mut batch, options.connect_timeout).await;
        }
    }
    if !batch.is_empty() {
        write_batch(&mut store, &shared, &mut batch, options.connect_timeout).await;
    }

    store.close().await;
    shared.connected.store(false, Ordering::Release);
    debug!(target: INTERNAL_TARGET, store = %store.describe(), "batch writer stopped");
}

async fn connect<S: LogStore>(store: &mut S, limit: Duration) -> Result<(), StoreError> {
    match timeout(limit, store.connect()).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::ConnectTimeout(limit)),
    }
}

/// Write one batch and clear it, whatever the outcome.
async fn write_batch<S: LogStore>(
    store: &mut S,
    shared: &Shared,
    batch: &mut Vec<LogRecord>,
    connect_timeout: Duration,
) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len() as u64;

    if !shared.connected.load(Ordering::Acquire) {
        if let Err(e) = connect(store, connect_timeout).await {
            shared.failed.fetch_add(count, Ordering::Relaxed);
            warn!(
                target: INTERNAL_TARGET,
                store = %store.describe(),
                error = %e,
                dropped = count,
                "log store unreachable, dropping batch"
            );
            shared.in_flight.fetch_sub(count, Ordering::AcqRel);
            batch.clear();
            return;
        }
        shared.connected.store(true, Ordering::Release);
        debug!(target: INTERNAL_TARGET, store = %store.describe(), "reconnected to log store");
    }

    let rows = rows_for_batch(batch);
    match store.insert_batch(&rows).await {
        Ok(()) => {
            shared.written.fetch_add(count, Ordering::Relaxed);
        }
        Err(e) => {
            shared.connected.store(false, Ordering::Release);
            shared.failed.fetch_add(count, Ordering::Relaxed);
            warn!(
                target: INTERNAL_TARGET,
                store = %store.describe(),
                error = %e,
                dropped = count,
                "failed to write log batch"
            );
        }
    }
    shared.in_flight.fetch_sub(count, Ordering::AcqRel);
    batch.clear();
}
