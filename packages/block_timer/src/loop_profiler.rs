//! Per-iteration sampling of a loop body over a fixed iteration budget.

use std::fmt;
use std::time::Duration;

use crate::report::format_seconds;
use crate::{Clock, ReportLine, SourceLocation, Timestamp, UsageError};

/// An active loop profile.
///
/// All samples are kept until the loop ends and statistics are computed once over the complete
/// set. Loops profiled this way are micro-benchmarks with small iteration counts, so there is
/// nothing to gain from streaming statistics.
#[derive(Debug)]
pub(crate) struct LoopSession {
    iteration_budget: u64,
    samples: Vec<Duration>,
    started_at: Timestamp,
    last_boundary: Timestamp,
    location: SourceLocation,
}

impl LoopSession {
    pub(crate) fn start(
        iteration_budget: u64,
        now: Timestamp,
        location: SourceLocation,
    ) -> Result<Self, UsageError> {
        if iteration_budget == 0 {
            return Err(UsageError::ZeroIterationBudget);
        }

        Ok(Self {
            iteration_budget,
            // The budget is only a capacity hint; an absurd budget must not allocate up front.
            samples: Vec::with_capacity(usize::try_from(iteration_budget).unwrap_or(0).min(4096)),
            started_at: now,
            last_boundary: now,
            location,
        })
    }

    /// Closes the current iteration at `now`, returning its duration.
    pub(crate) fn record(&mut self, now: Timestamp) -> Duration {
        let sample = Clock::elapsed(self.last_boundary, now);
        self.samples.push(sample);
        self.last_boundary = now;
        sample
    }

    pub(crate) fn should_continue(&self) -> bool {
        u64::try_from(self.samples.len()).is_ok_and(|count| count < self.iteration_budget)
    }

    pub(crate) fn finish(self, comment: &str, now: Timestamp) -> LoopSummary {
        LoopSummary::from_samples(
            comment.to_owned(),
            self.location,
            self.iteration_budget,
            self.samples,
            Clock::elapsed(self.started_at, now),
        )
    }
}

/// Statistics of a completed loop profile.
///
/// # Examples
///
/// ```
/// use std::ops::ControlFlow;
///
/// use block_timer::Session;
///
/// let mut session = Session::new();
/// let summary = session
///     .run_loop(5, "bench", |_| {
///         std::hint::black_box(42 * 2);
///         ControlFlow::Continue(())
///     })
///     .unwrap();
///
/// assert_eq!(summary.sample_count(), 5);
/// assert!(!summary.cancelled_early());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LoopSummary {
    comment: String,
    location: SourceLocation,
    iteration_budget: u64,
    samples: Vec<Duration>,
    total: Duration,
    mean: Duration,
    variance_secs: f64,
    min: Duration,
    max: Duration,
    wall: Duration,
}

impl LoopSummary {
    #[expect(
        clippy::cast_precision_loss,
        reason = "loop profiles are micro-benchmarks with sample counts far below 2^52"
    )]
    fn from_samples(
        comment: String,
        location: SourceLocation,
        iteration_budget: u64,
        samples: Vec<Duration>,
        wall: Duration,
    ) -> Self {
        let total = samples
            .iter()
            .try_fold(Duration::ZERO, |sum, sample| sum.checked_add(*sample))
            .expect("sample total overflows Duration - this indicates an unrealistic scenario");

        let (mean, variance_secs) = if samples.is_empty() {
            (Duration::ZERO, 0.0)
        } else {
            let mean = Duration::from_nanos(
                total
                    .as_nanos()
                    .checked_div(samples.len() as u128)
                    .expect("guarded by if condition")
                    .try_into()
                    .expect("all realistic values fit in u64"),
            );

            let count = samples.len() as f64;
            let mean_secs = total.as_secs_f64() / count;
            let variance_secs = samples
                .iter()
                .map(|sample| {
                    let deviation = sample.as_secs_f64() - mean_secs;
                    deviation * deviation
                })
                .sum::<f64>()
                / count;

            (mean, variance_secs)
        };

        Self {
            comment,
            location,
            iteration_budget,
            min: samples.iter().min().copied().unwrap_or_default(),
            max: samples.iter().max().copied().unwrap_or_default(),
            samples,
            total,
            mean,
            variance_secs,
            wall,
        }
    }

    /// The comment the loop was tagged with.
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Where the loop profile was started.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// The iteration budget the loop was started with.
    #[must_use]
    pub fn iteration_budget(&self) -> u64 {
        self.iteration_budget
    }

    /// Per-iteration durations in the order they were recorded.
    #[must_use]
    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// Number of recorded iterations.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Whether the driving loop exited before using up the iteration budget.
    #[must_use]
    pub fn cancelled_early(&self) -> bool {
        u64::try_from(self.samples.len()).is_ok_and(|count| count < self.iteration_budget)
    }

    /// Sum of all samples.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Mean duration of one iteration.
    #[must_use]
    pub fn mean(&self) -> Duration {
        self.mean
    }

    /// Population variance of the samples, in seconds squared.
    #[must_use]
    pub fn variance_secs(&self) -> f64 {
        self.variance_secs
    }

    /// Shortest iteration.
    #[must_use]
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Longest iteration.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Time from `loop_start` to `loop_end`, including any time spent outside recorded
    /// iterations.
    #[must_use]
    pub fn wall(&self) -> Duration {
        self.wall
    }

    /// Renders the mean iteration time as a report line.
    #[must_use]
    pub fn to_line(&self) -> ReportLine {
        ReportLine::new(self.location, self.comment.clone(), self.mean)
    }
}

impl fmt::Display for LoopSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.to_line())?;
        write!(
            f,
            "{}: {}: iterations: {} of {}, total (sec): {}, variance (sec^2): {}, min (sec): {}, max (sec): {}",
            self.location,
            self.comment,
            self.samples.len(),
            self.iteration_budget,
            format_seconds(self.total.as_secs_f64()).trim_start(),
            format_seconds(self.variance_secs).trim_start(),
            format_seconds(self.min.as_secs_f64()).trim_start(),
            format_seconds(self.max.as_secs_f64()).trim_start(),
        )
    }
}
