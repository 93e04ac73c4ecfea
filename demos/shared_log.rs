//! Independent shared-pointer appends to a real file.
//!
//! Several worker threads append variable-size records to one log file
//! without coordinating sizes up front. The shared cursor hands every
//! worker a private byte range, so records never interleave even though
//! completion order is arbitrary.
//!
//! Run with: cargo run --example shared_log

use std::sync::Arc;
use std::thread;

use ferrofp::{AccessMode, Info, LocalGroup, ProcessGroup, SharedFileHandle, UnixBackend};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.log");
    let backend = Arc::new(UnixBackend::new());

    let joins: Vec<_> = LocalGroup::split(4)
        .into_iter()
        .map(|group| {
            let backend = Arc::clone(&backend);
            let path = path.clone();
            thread::spawn(move || {
                let rank = group.rank();
                let mut fh = SharedFileHandle::new(
                    backend,
                    Arc::new(group),
                    &path,
                    AccessMode::READ_WRITE | AccessMode::CREATE,
                    Info::new(),
                );

                let mut total = 0u64;
                for record in 0..8 {
                    let line = format!("worker {rank} record {record}\n");
                    let receipt = fh.write(line.as_bytes()).unwrap();
                    total += receipt.bytes;
                }
                println!("worker {rank}: appended {total} bytes");
                total
            })
        })
        .collect();

    let expected: u64 = joins.into_iter().map(|j| j.join().unwrap()).sum();
    let on_disk = std::fs::metadata(&path).unwrap().len();
    assert_eq!(on_disk, expected);
    println!("log file holds {on_disk} bytes, none overlapping");
}
