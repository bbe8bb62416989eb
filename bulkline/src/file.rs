use crate::bulk::Bulk;
use crate::pool::{Handler, PoolError, ThreadPool, WorkerError, WorkerId};
use crate::sink::Sink;
use crate::statistics::Statistics;
use static_assertions as sa;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Builds the output file name for one bulk.
///
/// Worker ids are process-unique and the counter is per worker, so the
/// (timestamp, worker, counter) triple — and with it the name — is unique
/// across all workers of all contexts in one run.
pub fn make_filename(timestamp: u64, worker: WorkerId, counter: u16) -> String {
    format!("bulk{timestamp}_{worker}_{counter}.log")
}

/// Errors from the file sink's workers.
#[derive(Debug)]
pub enum FileSinkError {
    /// The bulk file could not be opened for writing.
    Open(PathBuf, io::Error),
    /// The bulk file could not be written.
    Write(PathBuf, io::Error),
}

impl std::error::Error for FileSinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSinkError::Open(_, err) | FileSinkError::Write(_, err) => Some(err),
        }
    }
}

impl fmt::Display for FileSinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSinkError::Open(path, err) => {
                write!(f, "can't open {} for output: {err}", path.display())
            }
            FileSinkError::Write(path, err) => {
                write!(f, "failed to write to {}: {err}", path.display())
            }
        }
    }
}

/// Writes each bulk to its own `bulk<ts>_<worker>_<counter>.log` file.
///
/// There is no shared output: every worker writes its own files. A failed
/// bulk is logged and surfaced via [`last_exception`](Self::last_exception)
/// but never retried.
pub struct FileSink {
    pool: ThreadPool<Arc<Bulk>, FileWorker>,
}

sa::assert_impl_all!(FileSink: Send, Sync);

impl FileSink {
    /// Default worker count: one per available hardware thread.
    pub fn default_workers() -> usize {
        num_cpus::get().max(1)
    }

    /// Starts the sink with files going to the current working directory.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        Self::with_directory(None, workers)
    }

    /// Starts the sink with files going to `directory` (which must
    /// already exist).
    pub fn with_directory(directory: Option<PathBuf>, workers: usize) -> Result<Self, PoolError> {
        let sink = Self {
            pool: ThreadPool::new(),
        };
        for _ in 0..workers.max(1) {
            sink.pool.add_worker(FileWorker::new(directory.clone()))?;
        }
        Ok(sink)
    }

    /// Drains the queue, joins the workers and returns their handlers
    /// with statistics and processed-file lists.
    pub fn stop(&self) -> Vec<FileWorker> {
        self.pool.stop_workers()
    }

    /// Pops the oldest captured worker error, if any.
    pub fn last_exception(&self) -> Option<WorkerError> {
        self.pool.last_exception()
    }
}

impl Sink for FileSink {
    fn emit(&self, bulk: Arc<Bulk>) {
        self.pool.push_message(bulk);
    }
}

/// Per-worker state of a [`FileSink`].
#[derive(Debug)]
pub struct FileWorker {
    id: Option<WorkerId>,
    directory: Option<PathBuf>,
    counter: u16,
    statistics: Statistics,
    processed: Vec<PathBuf>,
}

impl FileWorker {
    fn new(directory: Option<PathBuf>) -> Self {
        Self {
            id: None,
            directory,
            counter: 0,
            statistics: Statistics::default(),
            processed: Vec::new(),
        }
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Paths of every file this worker wrote, in completion order.
    pub fn processed_files(&self) -> &[PathBuf] {
        &self.processed
    }
}

impl Handler<Arc<Bulk>> for FileWorker {
    fn on_start(&mut self, id: WorkerId) {
        self.id = Some(id);
    }

    fn handle(&mut self, bulk: Arc<Bulk>) -> Result<(), WorkerError> {
        let id = self.id.expect("worker was not started through the pool");
        let name = make_filename(bulk.timestamp(), id, self.counter);
        self.counter = self.counter.wrapping_add(1);

        let path = match &self.directory {
            Some(directory) => directory.join(name),
            None => PathBuf::from(name),
        };
        let mut file =
            File::create(&path).map_err(|err| FileSinkError::Open(path.clone(), err))?;
        file.write_all(bulk.to_line().as_bytes())
            .map_err(|err| FileSinkError::Write(path.clone(), err))?;

        self.statistics.record(bulk.len());
        self.processed.push(path);
        Ok(())
    }
}
