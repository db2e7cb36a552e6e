#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Source-annotated wall-clock and processor time profiling of code blocks.
//!
//! This package measures how long labeled regions of a program take and reports every result as
//! a single line tagged with the source file and line that was measured:
//!
//! ```text
//! src/solver.rs:  42: assemble: Elapsed time (sec):         1.234560E-02
//! ```
//!
//! The core functionality includes:
//! - [`Session`] - Named timers, one-shot block timing and loop profiling for one thread
//! - [`Profiler`] - Drives sessions through a begin/measure/finalize lifecycle
//! - [`Clock`] - Monotonic, thread processor or process processor time, or a custom source
//! - [`Report`] - Accumulated results, mergeable across threads
//! - [`ProfilerConfig`] - TOML configuration of clock, sink and instrumented labels
//! - [`fileio`] - Line-oriented documents, directory listings and fixed-length foreign strings
//!
//! # Named timers
//!
//! ```
//! use block_timer::Profiler;
//!
//! let mut profiler = Profiler::new();
//! profiler.begin().unwrap();
//!
//! for _ in 0..3 {
//!     profiler.start("assemble").unwrap();
//!     // Assemble the system matrix.
//!     profiler.stop("assemble").unwrap();
//! }
//!
//! // Writes one line for "assemble" to stdout.
//! let report = profiler.finalize().unwrap();
//! assert_eq!(report.entry("assemble").unwrap().invocation_count(), 3);
//! ```
//!
//! # Timing a block
//!
//! ```
//! use block_timer::Session;
//!
//! let mut session = Session::new();
//!
//! // Writes one line as soon as the closure returns.
//! let sum = session
//!     .time_block("sum", |_| (0..1000_u64).sum::<u64>())
//!     .unwrap();
//! assert_eq!(sum, 499_500);
//! ```
//!
//! # Loop profiling
//!
//! A loop profile samples every iteration of a loop against an iteration budget and reports the
//! mean iteration time together with total, variance and extremes:
//!
//! ```
//! use block_timer::Session;
//!
//! let mut session = Session::new();
//!
//! session.loop_start(100).unwrap();
//! while session.should_continue() {
//!     std::hint::black_box(42 * 2);
//!     session.record_iteration().unwrap();
//! }
//! let summary = session.loop_end("kernel").unwrap();
//!
//! assert_eq!(summary.sample_count(), 100);
//! ```
//!
//! [`Session::run_loop()`] drives the same protocol from a closure that can exit early.
//!
//! # Threading
//!
//! A session belongs to one thread of control. Give every worker of a parallel region its own
//! session, measuring [`ClockKind::ThreadCpu`] if processor time is wanted, and combine the
//! workers' reports with [`Report::merge()`] after joining them.
//!
//! # Errors
//!
//! Calling operations out of order (stopping a timer that never started, ending a loop profile
//! that was never begun) returns [`Error::Usage`] and changes nothing. A clock that cannot be
//! read while measuring returns [`Error::ClockUnavailable`] and changes nothing either, so a
//! failed reading never turns into a recorded interval. Failing to write a report line never
//! fails the operation: the failure is logged through `tracing` and the line is written to stdout
//! instead.

mod clock;
mod config;
mod error;
pub mod fileio;
mod location;
mod loop_profiler;
mod pal;
mod profiler;
mod registry;
mod report;
mod session;
mod sink;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use location::*;
pub use loop_profiler::LoopSummary;
pub use profiler::*;
pub use registry::{Snapshot, TimerStats};
pub use report::{Report, ReportEntry, ReportLine};
pub use session::*;
pub use sink::{MemorySink, ReportSink};

pub(crate) const ERR_POISONED_LOCK: &str =
    "encountered poisoned lock - a thread panicked while writing report lines";
