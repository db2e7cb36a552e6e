//! Measures a parallel region with one session per worker and merges the results.
//!
//! Each worker measures its own processor time, so time spent waiting for the other workers is
//! not charged to it.
//!
//! Run with: `cargo run --example block_timer_threaded_reports`.
#![expect(
    clippy::arithmetic_side_effects,
    reason = "this is example code that does not need production-level safety"
)]

use std::hint::black_box;
use std::io;
use std::thread;

use block_timer::{Clock, ClockKind, Report, ReportSink, Session};

const WORKERS: u64 = 4;

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| thread::spawn(move || worker_thread(worker)))
        .collect();

    let merged = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker threads do not panic"))
        .fold(Report::default(), |total, report| Report::merge(&total, &report));

    println!("Merged report of {WORKERS} workers:");
    println!("{merged}");
}

fn worker_thread(worker: u64) -> Report {
    // Thread processor time is charged to whichever thread reads the clock.
    let clock = Clock::new(ClockKind::ThreadCpu).unwrap_or_else(|_| Clock::monotonic());
    let mut session = Session::with_clock_and_sink(clock, ReportSink::Stdout);

    for round in 0..3 {
        session
            .measure("partial_sum", |_| {
                black_box((0..200_000_u64).map(|i| i ^ (worker + round)).sum::<u64>())
            })
            .unwrap();
    }

    session.to_report()
}
