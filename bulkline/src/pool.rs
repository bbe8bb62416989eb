use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, trace};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Process-unique identifier of a pool worker.
///
/// Ids come from one process-wide counter, so two workers never share an
/// id even across pools. File names derived from worker ids therefore
/// stay unique across every sink of every context in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(usize);

impl WorkerId {
    fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An error captured from a worker: a handler failure or a caught panic.
pub type WorkerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from pool lifecycle operations.
#[derive(Debug)]
pub enum PoolError {
    /// The OS refused to spawn the worker thread.
    Spawn(io::Error),
    /// The worker thread died before signalling that it is running.
    WorkerVanished,
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::Spawn(err) => Some(err),
            PoolError::WorkerVanished => None,
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Spawn(err) => write!(f, "could not spawn worker thread: {err}"),
            PoolError::WorkerVanished => {
                f.write_str("worker thread died before it started running")
            }
        }
    }
}

/// Per-worker message consumer.
///
/// One handler instance is owned by exactly one worker thread. It carries
/// state (statistics, counters, file lists) across messages and is handed
/// back to the caller by [`ThreadPool::stop_workers`].
pub trait Handler<M>: Send + 'static {
    /// Runs once on the worker thread, before the first message.
    fn on_start(&mut self, id: WorkerId) {
        let _ = id;
    }

    /// Processes one message.
    ///
    /// An error (or a panic) is captured by the pool and the worker keeps
    /// running; see [`ThreadPool::last_exception`].
    fn handle(&mut self, msg: M) -> Result<(), WorkerError>;
}

struct Channel<M> {
    sender: Sender<M>,
    receiver: Receiver<M>,
}

struct Worker<H> {
    id: WorkerId,
    thread: JoinHandle<H>,
}

/// A FIFO message queue plus the set of worker threads draining it.
///
/// Messages may be pushed before the first worker exists; they are
/// retained and processed once one does. Tasks are dequeued FIFO, but
/// completion order across workers is unspecified.
pub struct ThreadPool<M, H>
where
    M: Send + 'static,
    H: Handler<M>,
{
    /// Queue endpoints. `None` between `stop_workers` and the next
    /// `add_worker`; a fresh generation gets a fresh channel.
    channel: Mutex<Option<Channel<M>>>,
    /// Touched only by `add_worker`, `stop_workers` and `workers_count`.
    workers: Mutex<Vec<Worker<H>>>,
    exceptions: Arc<Mutex<VecDeque<WorkerError>>>,
}

impl<M, H> ThreadPool<M, H>
where
    M: Send + 'static,
    H: Handler<M>,
{
    pub fn new() -> Self {
        Self {
            channel: Mutex::new(Some(Self::open_channel())),
            workers: Mutex::new(Vec::new()),
            exceptions: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn open_channel() -> Channel<M> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Channel { sender, receiver }
    }

    /// Spawns one worker and blocks until it is observably running.
    ///
    /// On failure nothing changes: no worker is added and the queue is
    /// untouched.
    pub fn add_worker(&self, mut handler: H) -> Result<WorkerId, PoolError> {
        let mut workers = self.workers.lock();

        let receiver = {
            let mut channel = self.channel.lock();
            match channel.as_ref() {
                Some(open) => open.receiver.clone(),
                None => {
                    let open = Self::open_channel();
                    let receiver = open.receiver.clone();
                    *channel = Some(open);
                    receiver
                }
            }
        };

        let id = WorkerId::next();
        let exceptions = Arc::clone(&self.exceptions);
        let (ready_sx, ready_rx) = crossbeam_channel::bounded(1);

        trace!("spawning pool worker {id}");
        let thread = std::thread::Builder::new()
            .name(format!("pool worker {id}"))
            .spawn(move || {
                handler.on_start(id);
                ready_sx.send(()).expect("start latch closed");
                worker_loop(id, handler, receiver, exceptions)
            })
            .map_err(PoolError::Spawn)?;

        if ready_rx.recv().is_err() {
            // The thread never reached the latch; reap it and leave the
            // pool as it was.
            let _ = thread.join();
            return Err(PoolError::WorkerVanished);
        }

        workers.push(Worker { id, thread });
        debug!("pool worker {id} running, {} worker(s) total", workers.len());
        Ok(id)
    }

    /// Number of live workers.
    pub fn workers_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Non-blocking FIFO enqueue.
    ///
    /// Messages pushed after [`stop_workers`](Self::stop_workers) are
    /// dropped and never reach a later worker generation.
    pub fn push_message(&self, msg: M) {
        match self.channel.lock().as_ref() {
            // The unbounded queue never blocks, and the pool itself holds
            // a receiver while the channel is open, so the send cannot
            // fail here.
            Some(open) => drop(open.sender.send(msg)),
            None => debug!("message dropped, pool is stopped"),
        }
    }

    /// Closes the queue, waits until every already-enqueued message has
    /// been processed and every worker has exited, and hands the worker
    /// handlers back to the caller. Idempotent.
    pub fn stop_workers(&self) -> Vec<H> {
        let mut workers = self.workers.lock();

        // Dropping both endpoints disconnects the queue: each worker
        // drains what is buffered and then sees the disconnect.
        *self.channel.lock() = None;

        let mut handlers = Vec::with_capacity(workers.len());
        for worker in workers.drain(..) {
            match worker.thread.join() {
                Ok(handler) => handlers.push(handler),
                Err(_) => {
                    // The loop catches handler panics, so this means the
                    // worker died outside of `handle`; its handler is
                    // gone with it.
                    error!("pool worker {} panicked outside its handler", worker.id);
                }
            }
        }
        trace!("pool stopped, {} handler(s) returned", handlers.len());
        handlers
    }

    /// Pops the oldest captured worker error, if any.
    pub fn last_exception(&self) -> Option<WorkerError> {
        self.exceptions.lock().pop_front()
    }
}

impl<M, H> Default for ThreadPool<M, H>
where
    M: Send + 'static,
    H: Handler<M>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M, H> fmt::Debug for ThreadPool<M, H>
where
    M: Send + 'static,
    H: Handler<M>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(ThreadPool)")
    }
}

impl<M, H> Drop for ThreadPool<M, H>
where
    M: Send + 'static,
    H: Handler<M>,
{
    fn drop(&mut self) {
        // Same graceful drain as an explicit `stop_workers`: nothing that
        // was enqueued is lost when the pool owner just drops it.
        let _ = self.stop_workers();
    }
}

/// Runs until the queue is both empty and disconnected, then returns the
/// handler to the joining thread.
fn worker_loop<M, H: Handler<M>>(
    id: WorkerId,
    mut handler: H,
    receiver: Receiver<M>,
    exceptions: Arc<Mutex<VecDeque<WorkerError>>>,
) -> H {
    for msg in receiver.iter() {
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(msg))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!("worker {id}: {err}");
                exceptions.lock().push_back(err);
            }
            Err(payload) => {
                let err: WorkerError = Box::new(HandlerPanic::new(payload));
                error!("worker {id}: {err}");
                exceptions.lock().push_back(err);
            }
        }
    }
    trace!("worker {id} drained its queue, exiting");
    handler
}

/// A panic caught inside [`Handler::handle`].
#[derive(Debug)]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| String::from("opaque panic payload"));
        Self { message }
    }
}

impl std::error::Error for HandlerPanic {}

impl fmt::Display for HandlerPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler panicked: {}", self.message)
    }
}
