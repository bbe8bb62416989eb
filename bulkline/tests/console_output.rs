//! Console sink tests: stream swapping and per-worker statistics.

use bulkline::{Bulk, ConsoleSink, OutputStream, SharedBuffer, Sink, Statistics};
use std::sync::Arc;

#[test]
fn swapping_the_stream_affects_subsequent_emits_only() {
    let first = SharedBuffer::new();
    let second = SharedBuffer::new();

    let sink = ConsoleSink::new(OutputStream::new(first.clone()), 1).unwrap();
    sink.emit(Arc::new(Bulk::new(0, vec!["cmd1".into()])));

    // The first bulk keeps the stream it was enqueued with, however fast
    // the swap comes in behind it.
    sink.set_ostream(OutputStream::new(second.clone()));
    sink.emit(Arc::new(Bulk::new(1, vec!["cmd2".into(), "cmd3".into()])));

    let stats = sink.stop();

    assert_eq!(first.contents(), "bulk: cmd1\n");
    assert_eq!(second.contents(), "bulk: cmd2, cmd3\n");

    let mut total = Statistics::default();
    for worker in stats {
        total += worker;
    }
    assert_eq!(total.bulks, 2);
    assert_eq!(total.commands, 3);
    assert!(sink.last_exception().is_none());
}

#[test]
fn concurrent_workers_never_interleave_within_a_line() {
    let buffer = SharedBuffer::new();
    let sink = ConsoleSink::new(OutputStream::new(buffer.clone()), 3).unwrap();

    for index in 0..50 {
        sink.emit(Arc::new(Bulk::new(
            0,
            vec![format!("a{index}"), format!("b{index}")],
        )));
    }
    let stats = sink.stop();
    assert_eq!(stats.len(), 3);

    let contents = buffer.contents();
    let mut lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 50);
    lines.sort_unstable();
    for line in lines {
        let body = line.strip_prefix("bulk: ").expect("malformed line");
        let parts: Vec<&str> = body.split(", ").collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0][1..], parts[1][1..]);
    }

    let mut total = Statistics::default();
    for worker in stats {
        total += worker;
    }
    assert_eq!(total.bulks, 50);
    assert_eq!(total.commands, 100);
}
