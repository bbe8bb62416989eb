use crate::bulk::Bulk;
use crate::pool::{Handler, PoolError, ThreadPool, WorkerError};
use crate::sink::Sink;
use crate::statistics::Statistics;
use crate::stream::OutputStream;
use parking_lot::Mutex;
use static_assertions as sa;
use std::sync::Arc;

/// The bulk plus the stream snapshot taken when it was enqueued.
///
/// Swapping the sink's stream never affects bulks that are already in the
/// queue; they keep the stream they were accepted with.
struct ConsoleMessage {
    out: Arc<OutputStream>,
    bulk: Arc<Bulk>,
}

/// Renders bulks to a shared text stream.
///
/// Every write goes through the stream's own mutex, so bulks emitted by
/// concurrent workers never interleave within a line.
pub struct ConsoleSink {
    out: Mutex<Arc<OutputStream>>,
    pool: ThreadPool<ConsoleMessage, ConsoleWorker>,
}

sa::assert_impl_all!(ConsoleSink: Send, Sync);

impl ConsoleSink {
    pub const DEFAULT_WORKERS: usize = 1;

    /// Starts the sink with `workers` worker threads (at least one)
    /// writing to `out`.
    pub fn new(out: Arc<OutputStream>, workers: usize) -> Result<Self, PoolError> {
        let sink = Self {
            out: Mutex::new(out),
            pool: ThreadPool::new(),
        };
        for _ in 0..workers.max(1) {
            sink.pool.add_worker(ConsoleWorker::default())?;
        }
        Ok(sink)
    }

    /// Replaces the target stream for subsequent emits.
    pub fn set_ostream(&self, out: Arc<OutputStream>) {
        *self.out.lock() = out;
    }

    /// Drains the queue, joins the workers and returns their statistics.
    pub fn stop(&self) -> Vec<Statistics> {
        self.pool
            .stop_workers()
            .into_iter()
            .map(|worker| worker.statistics)
            .collect()
    }

    /// Pops the oldest captured worker error, if any.
    pub fn last_exception(&self) -> Option<WorkerError> {
        self.pool.last_exception()
    }
}

impl Sink for ConsoleSink {
    fn emit(&self, bulk: Arc<Bulk>) {
        // Snapshot under a short lock; the actual I/O happens on a worker
        // thread with the snapshot.
        let out = Arc::clone(&self.out.lock());
        self.pool.push_message(ConsoleMessage { out, bulk });
    }
}

#[derive(Debug, Default)]
struct ConsoleWorker {
    statistics: Statistics,
}

impl Handler<ConsoleMessage> for ConsoleWorker {
    fn handle(&mut self, msg: ConsoleMessage) -> Result<(), WorkerError> {
        msg.out.write_all(msg.bulk.to_line().as_bytes())?;
        self.statistics.record(msg.bulk.len());
        Ok(())
    }
}
