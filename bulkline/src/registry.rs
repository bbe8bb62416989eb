use crate::context::{Context, ContextBuilder};
use crate::pool::PoolError;
use crate::stream::OutputStream;
use log::trace;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use static_assertions as sa;
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

/// Opaque identifier of a live context.
///
/// Issued by the registry and only ever interpreted by it: holders never
/// dereference anything through a handle, every call round-trips through
/// [`ContextRegistry::find`]. Two live contexts always compare unequal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    /// Raw transport form, e.g. across a C boundary. Never 0.
    pub fn into_raw(self) -> u64 {
        self.0.get()
    }

    /// Rebuilds a handle from its raw form; 0 is the null handle.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from [`ContextRegistry`] operations.
#[derive(Debug)]
pub enum RegistryError {
    /// Bulk sizes start at 1; a flat bulk may never be empty.
    InvalidBulkSize,
    /// The context's sink pools could not be started.
    Sink(PoolError),
    /// Every possible handle value has been issued.
    HandleExhaustion,
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Sink(err) => Some(err),
            RegistryError::InvalidBulkSize | RegistryError::HandleExhaustion => None,
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::InvalidBulkSize => f.write_str("bulk size must be at least 1"),
            RegistryError::Sink(err) => write!(f, "could not start sink workers: {err}"),
            RegistryError::HandleExhaustion => f.write_str("no more handles available"),
        }
    }
}

impl From<PoolError> for RegistryError {
    fn from(err: PoolError) -> Self {
        RegistryError::Sink(err)
    }
}

static REGISTRY: Lazy<ContextRegistry> = Lazy::new(ContextRegistry::new);

/// Process-wide set of live contexts, plus the default output stream new
/// contexts bind to.
pub struct ContextRegistry {
    contexts: RwLock<BTreeMap<Handle, Arc<Context>>>,
    next_handle: Mutex<u64>,
    default_ostream: Mutex<Arc<OutputStream>>,
}

sa::assert_impl_all!(ContextRegistry: Send, Sync);

impl ContextRegistry {
    fn new() -> Self {
        Self {
            contexts: RwLock::new(BTreeMap::new()),
            next_handle: Mutex::new(1),
            default_ostream: Mutex::new(OutputStream::stdout()),
        }
    }

    /// The process-wide registry, created on first use.
    pub fn instance() -> &'static Self {
        &REGISTRY
    }

    /// Creates a context bound to the current default stream and returns
    /// its handle.
    pub fn make_context(&self, bulk_size: usize) -> Result<Handle, RegistryError> {
        if bulk_size == 0 {
            return Err(RegistryError::InvalidBulkSize);
        }

        let ostream = Arc::clone(&self.default_ostream.lock());
        let context = ContextBuilder::new(bulk_size).ostream(ostream).build()?;

        let handle = self.allocate_handle()?;
        self.contexts.write().insert(handle, Arc::new(context));
        trace!("context {handle} created, bulk size {bulk_size}");
        Ok(handle)
    }

    /// Looks up a live context.
    ///
    /// The read lock is held only long enough to clone the reference out;
    /// the clone keeps the context alive across a concurrent
    /// [`erase`](Self::erase).
    pub fn find(&self, handle: Handle) -> Option<Arc<Context>> {
        self.contexts.read().get(&handle).cloned()
    }

    /// Removes a context; a second call on the same handle is a no-op.
    pub fn erase(&self, handle: Handle) {
        let removed = self.contexts.write().remove(&handle);
        if removed.is_some() {
            trace!("context {handle} erased");
        }
        // `removed` drops here, after the write lock is gone: the
        // terminal flush and the sink drain must not run under the lock.
    }

    /// Installs the default stream used by contexts created after this
    /// call; already-running contexts keep the stream they were built
    /// with.
    pub fn set_default_ostream(&self, ostream: Arc<OutputStream>) {
        *self.default_ostream.lock() = ostream;
    }

    fn allocate_handle(&self) -> Result<Handle, RegistryError> {
        let mut next = self.next_handle.lock();
        let handle = NonZeroU64::new(*next)
            .map(Handle)
            .ok_or(RegistryError::HandleExhaustion)?;
        *next = next
            .checked_add(1)
            .ok_or(RegistryError::HandleExhaustion)?;
        Ok(handle)
    }
}
