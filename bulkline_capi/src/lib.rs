//! C-ABI entry points over the [`bulkline::api`] facade.
//!
//! The exported surface mirrors the Rust facade one to one. Handles cross
//! the boundary as `u64`, with 0 as the null handle; no panic ever
//! unwinds past these functions.

use bulkline::{api, Handle};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};

/// Runs `f` behind a panic barrier; a panic is reported on the
/// diagnostic stream and `fallback` is returned in its place.
fn barrier<R>(what: &str, fallback: R, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            log::error!("bulkline: {what} panicked");
            eprintln!("bulkline: {what} panicked");
            fallback
        }
    }
}

/// Opens a context with the given flat bulk size.
///
/// Returns the context handle, or 0 on failure.
#[no_mangle]
pub extern "C" fn bulkline_connect(bulk_size: usize) -> u64 {
    barrier("connect", 0, || {
        api::connect(bulk_size).map_or(0, Handle::into_raw)
    })
}

/// Streams `size` bytes from `data` into the context behind `handle`.
///
/// A no-op on the null handle, on unknown handles, and on empty input.
///
/// # Safety
///
/// `data` must point to at least `size` readable bytes, or `size` must
/// be 0.
#[no_mangle]
pub unsafe extern "C" fn bulkline_receive(handle: u64, data: *const c_char, size: usize) {
    barrier("receive", (), || {
        let Some(handle) = Handle::from_raw(handle) else {
            return;
        };
        if data.is_null() || size == 0 {
            return;
        }
        // Safety: The caller guarantees `data` points to `size` bytes.
        let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), size) };
        api::receive(handle, bytes);
    });
}

/// Closes the context behind `handle` and waits for its sinks to drain.
///
/// Idempotent; the null handle and unknown handles are ignored.
#[no_mangle]
pub extern "C" fn bulkline_disconnect(handle: u64) {
    barrier("disconnect", (), || {
        if let Some(handle) = Handle::from_raw(handle) {
            api::disconnect(handle);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkline::{OutputStream, SharedBuffer};

    #[test]
    fn round_trip_through_the_c_surface() {
        let buffer = SharedBuffer::new();
        api::set_default_ostream(OutputStream::new(buffer.clone()));

        let handle = bulkline_connect(3);
        assert_ne!(handle, 0);

        let data = b"cmd1\ncmd2\ncmd3\n";
        // Safety: `data` is a live buffer of the given length.
        unsafe { bulkline_receive(handle, data.as_ptr().cast(), data.len()) };
        bulkline_disconnect(handle);

        assert_eq!(buffer.contents(), "bulk: cmd1, cmd2, cmd3\n");

        for entry in std::fs::read_dir(".").unwrap().flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("bulk") && name.ends_with(".log") {
                let _ = std::fs::remove_file(entry.path());
            }
        }
    }

    #[test]
    fn null_pointer_and_null_handle_are_ignored() {
        // Safety: null data with any size is rejected before the slice is
        // built.
        unsafe { bulkline_receive(0, std::ptr::null(), 16) };
        bulkline_disconnect(0);
    }
}
