//! Timing reports and their fixed-layout text rendering.

use std::fmt;
use std::time::Duration;

use crate::SourceLocation;

/// Width of the elapsed-seconds field of a report line.
const VALUE_WIDTH: usize = 20;

/// Digits after the decimal point of the elapsed-seconds field.
const VALUE_PRECISION: usize = 6;

/// One completed measurement, rendered as a single line of text.
///
/// The rendering is
///
/// ```text
/// <file>:<line>: <label>: Elapsed time (sec): <value>
/// ```
///
/// where `<line>` is right-aligned in four columns and `<value>` is in scientific notation
/// (`1.000000E-02`) right-aligned in twenty columns. Consumers parsing this output should treat
/// `:` and `Elapsed time (sec):` as literal separators.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use block_timer::{ReportLine, SourceLocation};
///
/// let line = ReportLine::new(
///     SourceLocation::new("solver.rs", 42),
///     "init",
///     Duration::from_millis(10),
/// );
///
/// assert_eq!(
///     line.to_string(),
///     "solver.rs:  42: init: Elapsed time (sec):         1.000000E-02"
/// );
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportLine {
    location: SourceLocation,
    label: String,
    elapsed: Duration,
}

impl ReportLine {
    /// Creates a report line.
    #[must_use]
    pub fn new(location: SourceLocation, label: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            location,
            label: label.into(),
            elapsed,
        }
    }

    /// Where the measurement was opened.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// The timer label or block comment.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The measured time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: Elapsed time (sec): {}",
            self.location,
            self.label,
            format_seconds(self.elapsed.as_secs_f64())
        )
    }
}

/// Renders seconds in scientific notation with a signed two-digit exponent, right-aligned in a
/// fixed width. Text that does not fit is truncated to the width; nothing here can fail.
pub(crate) fn format_seconds(seconds: f64) -> String {
    let text = if seconds.is_finite() {
        let raw = format!("{seconds:.precision$e}", precision = VALUE_PRECISION);

        match raw.split_once('e') {
            Some((mantissa, exponent)) => match exponent.parse::<i32>() {
                Ok(exponent) => {
                    let sign = if exponent < 0 { '-' } else { '+' };
                    format!("{mantissa}E{sign}{:02}", exponent.unsigned_abs())
                }
                Err(_) => raw,
            },
            None => raw,
        }
    } else if seconds.is_nan() {
        "NaN".to_owned()
    } else if seconds.is_sign_positive() {
        "Infinity".to_owned()
    } else {
        "-Infinity".to_owned()
    };

    let mut field = format!("{text:>width$}", width = VALUE_WIDTH);
    field.truncate(VALUE_WIDTH);
    field
}

/// Accumulated statistics of one label in a [`Report`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportEntry {
    label: String,
    location: SourceLocation,
    total: Duration,
    invocation_count: u64,
}

impl ReportEntry {
    pub(crate) fn new(
        label: String,
        location: SourceLocation,
        total: Duration,
        invocation_count: u64,
    ) -> Self {
        Self {
            label,
            location,
            total,
            invocation_count,
        }
    }

    /// The timer label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Where the label was first started.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Total time across all completed start/stop pairs.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Number of completed start/stop pairs.
    #[must_use]
    pub fn invocation_count(&self) -> u64 {
        self.invocation_count
    }

    /// Mean time per completed start/stop pair, or zero if there were none.
    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.invocation_count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(
                self.total
                    .as_nanos()
                    .checked_div(u128::from(self.invocation_count))
                    .expect("guarded by if condition")
                    .try_into()
                    .expect("all realistic values fit in u64"),
            )
        }
    }

    /// Renders the entry as a report line carrying the total time.
    #[must_use]
    pub fn to_line(&self) -> ReportLine {
        ReportLine::new(self.location, self.label.clone(), self.total)
    }
}

/// Timing statistics captured by a session.
///
/// Entries are ordered by when their label was first started (or declared). Reports are
/// independent of the session they came from and can be sent to other threads, which makes them
/// the unit of aggregation when every worker of a parallel region profiles with its own session.
///
/// # Examples
///
/// ```
/// use block_timer::Session;
///
/// let mut session = Session::new();
/// session.start("assemble").unwrap();
/// session.stop("assemble").unwrap();
///
/// let report = session.to_report();
/// let entry = report.entry("assemble").unwrap();
/// assert_eq!(entry.invocation_count(), 1);
/// ```
///
/// # Merging reports
///
/// ```
/// use std::thread;
///
/// use block_timer::{Report, Session};
///
/// let reports: Vec<Report> = (0..2)
///     .map(|_| {
///         thread::spawn(|| {
///             let mut session = Session::new();
///             session.start("kernel").unwrap();
///             session.stop("kernel").unwrap();
///             session.to_report()
///         })
///     })
///     .collect::<Vec<_>>()
///     .into_iter()
///     .map(|worker| worker.join().unwrap())
///     .collect();
///
/// let merged = Report::merge(&reports[0], &reports[1]);
/// assert_eq!(merged.entry("kernel").unwrap().invocation_count(), 2);
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Report {
    entries: Vec<ReportEntry>,
    elapsed: Duration,
}

impl Report {
    pub(crate) fn new(entries: Vec<ReportEntry>, elapsed: Duration) -> Self {
        Self { entries, elapsed }
    }

    /// Merges two reports into a new report.
    ///
    /// Entries with the same label have their totals and invocation counts added, keeping the
    /// source location and position of the entry in `a`. Labels only present in `b` follow in
    /// their original order. The session elapsed time of the merged report is the longer of the
    /// two, as merged reports normally come from sessions that ran side by side.
    #[must_use]
    pub fn merge(a: &Self, b: &Self) -> Self {
        let mut entries = a.entries.clone();

        for b_entry in &b.entries {
            match entries.iter_mut().find(|entry| entry.label == b_entry.label) {
                Some(entry) => {
                    entry.total = entry.total.checked_add(b_entry.total).expect(
                        "merging timer totals overflows Duration - this indicates an unrealistic scenario",
                    );
                    entry.invocation_count = entry
                        .invocation_count
                        .checked_add(b_entry.invocation_count)
                        .expect("merging invocation counts overflows u64 - this indicates an unrealistic scenario");
                }
                None => entries.push(b_entry.clone()),
            }
        }

        Self {
            entries,
            elapsed: a.elapsed.max(b.elapsed),
        }
    }

    /// Returns the entries of the report in order.
    pub fn entries(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter()
    }

    /// Returns the entry of a label, if the label completed at least one measurement.
    #[must_use]
    pub fn entry(&self, label: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|entry| entry.label == label)
    }

    /// Returns one report line per entry, in order.
    pub fn lines(&self) -> impl Iterator<Item = ReportLine> {
        self.entries.iter().map(ReportEntry::to_line)
    }

    /// Time from the start of the session to the moment the report was taken.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether there is any completed measurement in this report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|entry| entry.invocation_count == 0)
    }

    /// Prints the report lines to stdout.
    ///
    /// Prints nothing if no measurements were captured.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        if self.is_empty() {
            return;
        }
        print!("{self}");
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            writeln!(f, "No timing statistics captured.")?;
        } else {
            for line in self.lines() {
                writeln!(f, "{line}")?;
            }
        }
        Ok(())
    }
}
