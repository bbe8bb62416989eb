use crate::bulk::Bulk;
use std::sync::Arc;

/// A subscriber that carries published bulks to some external target.
///
/// Publication is a one-way fan-out: sinks hold no reference back to the
/// accumulator, and the accumulator knows nothing about a sink beyond
/// this trait.
pub trait Sink: Send + Sync {
    /// Accepts one published bulk.
    ///
    /// Must return quickly; the engine's sinks only enqueue here and do
    /// the actual I/O on their worker threads.
    fn emit(&self, bulk: Arc<Bulk>);
}
