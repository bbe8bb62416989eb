//! Facade tests: the `connect` / `receive` / `disconnect` surface.
//!
//! The registry and its default stream are process-wide, so every test
//! takes the `SERIAL` guard.

use bulkline::{api, OutputStream, SharedBuffer};
use parking_lot::Mutex;
use std::sync::Once;
use std::thread;
use std::time::Duration;

static SERIAL: Mutex<()> = Mutex::new(());
static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(pretty_env_logger::init);
}

/// Removes the file sink's output from the working directory.
fn remove_bulk_logs() {
    let Ok(entries) = std::fs::read_dir(".") else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("bulk") && name.ends_with(".log") {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

#[test]
fn unique_handles() {
    let _guard = SERIAL.lock();
    init_logging();

    let first = api::connect(3).unwrap();
    let second = api::connect(3).unwrap();
    assert_ne!(first, second);

    api::disconnect(first);
    api::disconnect(second);
    remove_bulk_logs();
}

#[test]
fn multiple_disconnects() {
    let _guard = SERIAL.lock();
    init_logging();

    let handle = api::connect(3).unwrap();
    api::disconnect(handle);
    api::disconnect(handle);
    remove_bulk_logs();
}

#[test]
fn zero_bulk_size_yields_the_null_handle() {
    let _guard = SERIAL.lock();
    init_logging();

    assert!(api::connect(0).is_none());
}

#[test]
fn no_processing_after_disconnect() {
    let _guard = SERIAL.lock();
    init_logging();

    let buffer = SharedBuffer::new();
    api::set_default_ostream(OutputStream::new(buffer.clone()));

    let handle = api::connect(3).unwrap();
    api::disconnect(handle);
    api::receive(handle, b"cmd1\ncmd2\ncmd3\ncmd4\ncmd5\n");

    assert!(buffer.is_empty());
    remove_bulk_logs();
}

#[test]
fn byte_by_byte_input_concatenates() {
    let _guard = SERIAL.lock();
    init_logging();

    let buffer = SharedBuffer::new();
    api::set_default_ostream(OutputStream::new(buffer.clone()));

    let handle = api::connect(3).unwrap();
    for byte in b"cmd1\ncmd2\ncmd3\ncmd4\ncmd5\n" {
        api::receive(handle, std::slice::from_ref(byte));
    }
    api::disconnect(handle);

    assert_eq!(
        buffer.contents(),
        "bulk: cmd1, cmd2, cmd3\nbulk: cmd4, cmd5\n"
    );
    remove_bulk_logs();
}

#[test]
fn output_as_soon_as_the_bulk_is_full() {
    let _guard = SERIAL.lock();
    init_logging();

    let buffer = SharedBuffer::new();
    api::set_default_ostream(OutputStream::new(buffer.clone()));

    let handle = api::connect(3).unwrap();
    api::receive(handle, b"cmd1\ncmd2\n");
    assert!(buffer.is_empty());

    api::receive(handle, b"cmd3\n");
    thread::sleep(Duration::from_millis(200));
    assert_eq!(buffer.contents(), "bulk: cmd1, cmd2, cmd3\n");

    api::disconnect(handle);
    assert_eq!(buffer.contents(), "bulk: cmd1, cmd2, cmd3\n");
    remove_bulk_logs();
}

#[test]
fn disconnect_flushes_the_pending_batch() {
    let _guard = SERIAL.lock();
    init_logging();

    let buffer = SharedBuffer::new();
    api::set_default_ostream(OutputStream::new(buffer.clone()));

    let handle = api::connect(3).unwrap();
    api::receive(handle, b"cmd1\ncmd2\ncmd3\ncmd4\ncmd5\n");
    thread::sleep(Duration::from_millis(200));
    assert_eq!(buffer.contents(), "bulk: cmd1, cmd2, cmd3\n");

    api::disconnect(handle);
    assert_eq!(
        buffer.contents(),
        "bulk: cmd1, cmd2, cmd3\nbulk: cmd4, cmd5\n"
    );
    remove_bulk_logs();
}

#[test]
fn interleaved_contexts_stay_independent() {
    let _guard = SERIAL.lock();
    init_logging();

    let first_buffer = SharedBuffer::new();
    api::set_default_ostream(OutputStream::new(first_buffer.clone()));
    let first = api::connect(3).unwrap();

    let second_buffer = SharedBuffer::new();
    api::set_default_ostream(OutputStream::new(second_buffer.clone()));
    let second = api::connect(3).unwrap();

    let first_data = b"cmd1\ncmd2\ncmd3\ncmd4\ncmd5\n";
    let second_data = b"some\nabra\n{\ncadabra\n}\n";
    let longest = first_data.len().max(second_data.len());
    for position in 0..longest {
        if let Some(byte) = first_data.get(position) {
            api::receive(first, std::slice::from_ref(byte));
        }
        if let Some(byte) = second_data.get(position) {
            api::receive(second, std::slice::from_ref(byte));
        }
    }
    api::disconnect(first);
    api::disconnect(second);

    assert_eq!(
        first_buffer.contents(),
        "bulk: cmd1, cmd2, cmd3\nbulk: cmd4, cmd5\n"
    );
    assert_eq!(
        second_buffer.contents(),
        "bulk: some, abra\nbulk: cadabra\n"
    );
    remove_bulk_logs();
}
