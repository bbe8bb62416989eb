//! Demo executable: streams standard input into one batching context.
//!
//! Usage: `bulkline [BULK_SIZE]` (default 3). Bulks go to standard output
//! and to `bulk*.log` files in the working directory.

use bulkline::api;
use log::error;
use std::io::Read;
use std::process::ExitCode;

const DEFAULT_BULK_SIZE: usize = 3;
const READ_BUFFER: usize = 4096;

fn bulk_size_from_args() -> Result<usize, String> {
    let mut args = std::env::args().skip(1);
    match args.next() {
        None => Ok(DEFAULT_BULK_SIZE),
        Some(arg) => match arg.parse::<usize>() {
            Ok(size) if size >= 1 => Ok(size),
            _ => Err(format!("invalid bulk size: {arg}")),
        },
    }
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    let bulk_size = match bulk_size_from_args() {
        Ok(size) => size,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("usage: bulkline [BULK_SIZE]");
            return ExitCode::FAILURE;
        }
    };

    let Some(handle) = api::connect(bulk_size) else {
        error!("could not open a context");
        return ExitCode::FAILURE;
    };

    let mut stdin = std::io::stdin().lock();
    let mut buffer = [0u8; READ_BUFFER];
    loop {
        match stdin.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => api::receive(handle, &buffer[..read]),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                error!("reading standard input failed: {err}");
                break;
            }
        }
    }

    api::disconnect(handle);
    ExitCode::SUCCESS
}
