use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// A shared output stream.
///
/// The writer is locked for the whole of each bulk write, so bulks from
/// concurrent workers never interleave within a line. Streams are shared
/// as `Arc<OutputStream>`; swapping the process default for future
/// contexts is the registry's job, while a sink holding an `Arc` keeps
/// its snapshot alive for in-flight writes.
pub struct OutputStream {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl OutputStream {
    pub fn new(writer: impl Write + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Box::new(writer)),
        })
    }

    /// A stream backed by standard output.
    pub fn stdout() -> Arc<Self> {
        Self::new(io::stdout())
    }

    /// Writes and flushes `bytes` as one unit.
    pub(crate) fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.write_all(bytes)?;
        inner.flush()
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(OutputStream)")
    }
}

/// Cloneable in-memory capture buffer.
///
/// The test and administration counterpart of a real output target: wrap
/// one in an [`OutputStream`], install it via
/// [`set_default_ostream`](crate::api::set_default_ostream), and inspect
/// [`contents`](Self::contents) afterwards.
#[derive(Debug, Default, Clone)]
pub struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.data.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
