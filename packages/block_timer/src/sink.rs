//! Destinations for rendered report lines.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::error;

use crate::ERR_POISONED_LOCK;

/// Where rendered report lines are written.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub enum ReportSink {
    /// Standard output.
    #[default]
    Stdout,

    /// Standard error.
    Stderr,

    /// A file that lines are appended to. The file is created if it does not exist.
    File(PathBuf),

    /// An in-memory buffer that can be inspected after the measurements.
    Memory(MemorySink),
}

/// In-memory collection of report lines.
///
/// Clones share the same buffer, so a clone kept by the caller observes every line written
/// through the sink it was handed to.
///
/// # Examples
///
/// ```
/// use block_timer::{Clock, MemorySink, ReportSink, Session};
///
/// let lines = MemorySink::new();
/// let mut session =
///     Session::with_clock_and_sink(Clock::monotonic(), ReportSink::Memory(lines.clone()));
///
/// session.time_block("setup", |_| {}).unwrap();
///
/// assert_eq!(lines.lines().len(), 1);
/// assert!(lines.lines()[0].contains("setup: Elapsed time (sec):"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line written so far, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect(ERR_POISONED_LOCK).clone()
    }

    /// Discards every line written so far.
    pub fn clear(&self) {
        self.lines.lock().expect(ERR_POISONED_LOCK).clear();
    }

    fn push(&self, text: &str) {
        self.lines
            .lock()
            .expect(ERR_POISONED_LOCK)
            .extend(text.lines().map(str::to_owned));
    }
}

/// Writes rendered lines to a [`ReportSink`], falling back to stdout when the sink fails.
#[derive(Debug)]
pub(crate) struct ReportWriter {
    sink: ReportSink,
    failures: u64,
}

impl ReportWriter {
    pub(crate) fn new(sink: ReportSink) -> Self {
        Self { sink, failures: 0 }
    }

    pub(crate) fn sink(&self) -> &ReportSink {
        &self.sink
    }

    /// How many writes could not be delivered to the configured sink.
    pub(crate) fn failures(&self) -> u64 {
        self.failures
    }

    /// Writes one rendered block of text, never failing.
    ///
    /// If the configured sink cannot be written, the failure is logged and counted and the text
    /// goes to stdout instead.
    pub(crate) fn emit(&mut self, text: &str) {
        let Err(e) = self.try_emit(text) else {
            return;
        };

        self.failures = self.failures.saturating_add(1);
        error!(sink = ?self.sink, error = %e, "report sink unwritable, writing to stdout");

        if let Err(e) = writeln!(io::stdout().lock(), "{text}") {
            error!(error = %e, "stdout fallback failed, report line lost");
        }
    }

    #[cfg_attr(test, mutants::skip)] // Console output is manually tested.
    fn try_emit(&self, text: &str) -> io::Result<()> {
        match &self.sink {
            ReportSink::Stdout => writeln!(io::stdout().lock(), "{text}"),
            ReportSink::Stderr => writeln!(io::stderr().lock(), "{text}"),
            ReportSink::File(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{text}")
            }
            ReportSink::Memory(memory) => {
                memory.push(text);
                Ok(())
            }
        }
    }
}
