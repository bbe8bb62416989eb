use crate::accumulator::Accumulator;
use crate::console::ConsoleSink;
use crate::file::FileSink;
use crate::pool::PoolError;
use crate::sink::Sink;
use crate::statistics::Statistics;
use crate::stream::OutputStream;
use log::debug;
use parking_lot::Mutex;
use static_assertions as sa;
use std::path::PathBuf;
use std::sync::Arc;

/// Configures and builds a [`Context`].
///
/// ```no_run
/// use bulkline::{ContextBuilder, OutputStream};
///
/// let context = ContextBuilder::new(3)
///     .ostream(OutputStream::stdout())
///     .console_workers(1)
///     .build()
///     .expect("sink pools failed to start");
/// context.process(b"cmd1\ncmd2\ncmd3\n");
/// ```
#[derive(Debug)]
pub struct ContextBuilder {
    bulk_size: usize,
    ostream: Option<Arc<OutputStream>>,
    console_workers: usize,
    file_workers: usize,
    file_directory: Option<PathBuf>,
}

impl ContextBuilder {
    pub fn new(bulk_size: usize) -> Self {
        Self {
            bulk_size,
            ostream: None,
            console_workers: ConsoleSink::DEFAULT_WORKERS,
            file_workers: FileSink::default_workers(),
            file_directory: None,
        }
    }

    /// Target stream of the console sink; standard output when unset.
    pub fn ostream(mut self, out: Arc<OutputStream>) -> Self {
        self.ostream = Some(out);
        self
    }

    pub fn console_workers(mut self, workers: usize) -> Self {
        self.console_workers = workers;
        self
    }

    pub fn file_workers(mut self, workers: usize) -> Self {
        self.file_workers = workers;
        self
    }

    /// Directory for the file sink's output; the working directory when
    /// unset.
    pub fn file_directory(mut self, directory: PathBuf) -> Self {
        self.file_directory = Some(directory);
        self
    }

    /// Starts both sink pools and binds a fresh accumulator to them.
    pub fn build(self) -> Result<Context, PoolError> {
        debug_assert!(self.bulk_size >= 1, "a flat bulk may never be empty");

        let out = self.ostream.unwrap_or_else(OutputStream::stdout);
        let console = Arc::new(ConsoleSink::new(out, self.console_workers)?);
        let file = Arc::new(FileSink::with_directory(
            self.file_directory,
            self.file_workers,
        )?);

        let mut accumulator = Accumulator::new(self.bulk_size);
        accumulator.subscribe(Arc::clone(&console) as Arc<dyn Sink>);
        accumulator.subscribe(Arc::clone(&file) as Arc<dyn Sink>);

        Ok(Context {
            accumulator: Mutex::new(accumulator),
            console,
            file,
        })
    }
}

/// One independent parsing and accumulation session.
///
/// Owns one accumulator and the two sinks it publishes to. Dropping the
/// context flushes the accumulator and drains both sink pools, so every
/// bulk published before or by the terminal flush is written out.
pub struct Context {
    accumulator: Mutex<Accumulator>,
    console: Arc<ConsoleSink>,
    file: Arc<FileSink>,
}

sa::assert_impl_all!(Context: Send, Sync);

impl Context {
    pub fn builder(bulk_size: usize) -> ContextBuilder {
        ContextBuilder::new(bulk_size)
    }

    /// Feeds raw bytes into this context.
    ///
    /// Interleaved calls from multiple threads are serialized, so the
    /// byte stream stays coherent; different contexts never synchronize
    /// with each other.
    pub fn process(&self, bytes: &[u8]) {
        self.accumulator.lock().receive(bytes);
    }

    /// Bulks and commands this context has published so far.
    pub fn statistics(&self) -> Statistics {
        self.accumulator.lock().statistics()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.accumulator.lock().close();

        // Both pools drain everything enqueued up to and including the
        // terminal flush before the sinks go away.
        let console = self
            .console
            .stop()
            .into_iter()
            .fold(Statistics::default(), |mut total, stats| {
                total += stats;
                total
            });
        let file = self
            .file
            .stop()
            .into_iter()
            .fold(Statistics::default(), |mut total, worker| {
                total += worker.statistics();
                total
            });
        debug!(
            "context closed: {} bulk(s) to console, {} bulk(s) to files",
            console.bulks, file.bulks
        );
    }
}
