//! The embedding facade: [`connect`], [`receive`], [`disconnect`].
//!
//! Errors never escape this surface. Failures are logged and swallowed;
//! unknown handles are silently ignored, which also makes repeated
//! [`disconnect`] calls harmless.

use crate::registry::{ContextRegistry, Handle};
use crate::stream::OutputStream;
use log::error;
use std::sync::Arc;

/// Opens a new context with the given flat bulk size.
///
/// Returns `None` — the null handle — if the context cannot be created.
pub fn connect(bulk_size: usize) -> Option<Handle> {
    match ContextRegistry::instance().make_context(bulk_size) {
        Ok(handle) => Some(handle),
        Err(err) => {
            error!("connect: failed to create a context: {err}");
            None
        }
    }
}

/// Streams raw bytes into the context behind `handle`.
///
/// Bytes may be fragmented arbitrarily across calls; the emitted bulks
/// depend only on the byte sequence. A no-op on unknown (e.g. already
/// disconnected) handles.
pub fn receive(handle: Handle, bytes: &[u8]) {
    if let Some(context) = ContextRegistry::instance().find(handle) {
        context.process(bytes);
    }
}

/// Closes the context behind `handle`.
///
/// Pending flat commands are flushed, an unfinished block is discarded,
/// and both sink queues are drained before the context goes away.
/// Idempotent.
pub fn disconnect(handle: Handle) {
    ContextRegistry::instance().erase(handle);
}

/// Installs the default output stream for contexts created after this
/// call.
pub fn set_default_ostream(ostream: Arc<OutputStream>) {
    ContextRegistry::instance().set_default_ostream(ostream);
}
