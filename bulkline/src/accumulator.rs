use crate::bulk::Bulk;
use crate::sink::Sink;
use crate::statistics::Statistics;
use log::trace;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const BLOCK_OPEN: &str = "{";
const BLOCK_CLOSE: &str = "}";

/// Batching state: flat batching up to the configured bulk size, or
/// inside one or more nested `{`/`}` groups where the size limit is
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Flat,
    Block { depth: usize },
}

/// Streaming parser and bulk accumulator.
///
/// Bytes go in through [`receive`](Self::receive) in arbitrary fragments;
/// commands are completed by `\n`. Completed bulks are published to every
/// subscribed sink, stamped with the wall-clock second at which their
/// first command was accepted. The emitted bulk sequence depends only on
/// the byte sequence, never on how it was fragmented.
pub struct Accumulator {
    bulk_size: usize,
    mode: Mode,
    /// Trailing bytes of a line whose `\n` has not arrived yet.
    partial: Vec<u8>,
    buffer: Vec<String>,
    /// First-command instant of the open bulk; `None` between bulks.
    timestamp: Option<u64>,
    sinks: Vec<Arc<dyn Sink>>,
    statistics: Statistics,
}

impl Accumulator {
    /// `bulk_size` is the flat-mode flush threshold and must be at least 1.
    pub fn new(bulk_size: usize) -> Self {
        debug_assert!(bulk_size >= 1, "a flat bulk may never be empty");
        Self {
            bulk_size,
            mode: Mode::Flat,
            partial: Vec::new(),
            buffer: Vec::new(),
            timestamp: None,
            sinks: Vec::new(),
            statistics: Statistics::default(),
        }
    }

    /// Registers a sink. Bulks are published in subscription order.
    pub fn subscribe(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    /// Feeds raw bytes; an unterminated tail is buffered for the next
    /// call.
    pub fn receive(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                self.accept(line);
            } else {
                self.partial.push(byte);
            }
        }
    }

    /// Terminal call: publishes a pending flat batch; discards the
    /// contents of an unclosed block and any unterminated trailing line.
    pub fn close(&mut self) {
        self.partial.clear();
        match self.mode {
            Mode::Flat => self.flush(),
            Mode::Block { .. } => {
                trace!(
                    "discarding {} command(s) of an unclosed block",
                    self.buffer.len()
                );
                self.buffer.clear();
                self.timestamp = None;
            }
        }
    }

    /// Bulks and commands published so far.
    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    fn accept(&mut self, command: String) {
        match (self.mode, command.as_str()) {
            (Mode::Flat, BLOCK_OPEN) => {
                // Opening a block force-flushes whatever flat batch is
                // pending, even below the size threshold.
                self.flush();
                self.mode = Mode::Block { depth: 1 };
            }
            (Mode::Block { depth }, BLOCK_OPEN) => {
                self.mode = Mode::Block { depth: depth + 1 };
            }
            (Mode::Block { depth: 1 }, BLOCK_CLOSE) => {
                self.flush();
                self.mode = Mode::Flat;
            }
            (Mode::Block { depth }, BLOCK_CLOSE) => {
                self.mode = Mode::Block { depth: depth - 1 };
            }
            // A `}` in flat mode lands here as an ordinary command, as
            // does every non-brace line, the empty line included.
            _ => {
                if self.buffer.is_empty() {
                    self.timestamp = Some(now_seconds());
                }
                self.buffer.push(command);
                if self.mode == Mode::Flat && self.buffer.len() == self.bulk_size {
                    self.flush();
                }
            }
        }
    }

    /// Publishes the buffered bulk to every sink and clears the buffer.
    /// A no-op on an empty buffer; no bulk is ever empty.
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let timestamp = self.timestamp.take().unwrap_or_else(now_seconds);
        let commands = std::mem::take(&mut self.buffer);
        self.statistics.record(commands.len());

        let bulk = Arc::new(Bulk::new(timestamp, commands));
        trace!("publishing bulk of {} command(s)", bulk.len());
        for sink in &self.sinks {
            sink.emit(Arc::clone(&bulk));
        }
    }
}

fn now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
