//! Embeddable asynchronous bulk-command batching engine.
//!
//! Client code opens independent [contexts](Context), streams raw bytes
//! into them over time (byte-granular, possibly split across many calls
//! and many threads), and the engine parses the stream into
//! newline-delimited commands, groups the commands into [bulks](Bulk)
//! according to the batching policy, and hands each completed bulk to a
//! set of [sinks](Sink) backed by background worker pools.
//!
//! The usual entry point is the [`api`] facade:
//!
//! ```no_run
//! use bulkline::api;
//!
//! let handle = api::connect(3).expect("context creation failed");
//! api::receive(handle, b"cmd1\ncmd2\ncmd3\n");
//! api::disconnect(handle);
//! ```
//!
//! Batching follows two rules: in flat mode a bulk closes after
//! `bulk_size` commands; a line consisting of `{` switches to block mode,
//! where the size limit is ignored and the bulk closes only when the
//! matching `}` arrives. An unfinished block is discarded when the
//! context closes.

pub mod api;

mod accumulator;
mod bulk;
mod console;
mod context;
mod file;
mod pool;
mod registry;
mod sink;
mod statistics;
mod stream;

pub use accumulator::Accumulator;
pub use bulk::Bulk;
pub use console::ConsoleSink;
pub use context::{Context, ContextBuilder};
pub use file::{make_filename, FileSink, FileSinkError, FileWorker};
pub use pool::{Handler, HandlerPanic, PoolError, ThreadPool, WorkerError, WorkerId};
pub use registry::{ContextRegistry, Handle, RegistryError};
pub use sink::Sink;
pub use statistics::Statistics;
pub use stream::{OutputStream, SharedBuffer};
