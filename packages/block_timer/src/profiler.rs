use std::mem;
use std::ops::ControlFlow;
use std::time::Duration;

use tracing::{debug, warn};

#[cfg(test)]
use crate::pal::PlatformFacade;
use crate::{
    Clock, LabelFilter, LoopSummary, ProfilerConfig, Report, ReportLine, ReportSink, Result,
    Session, Snapshot, SourceLocation, UsageError,
};

/// Lifecycle phase of a [`Profiler`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Phase {
    /// No profiling session exists. Only [`Profiler::begin()`] is accepted.
    Idle,

    /// A profiling session is collecting measurements.
    Active,
}

#[derive(Debug)]
struct ActiveSession {
    session: Session,
    origin: SourceLocation,
}

#[derive(Debug)]
enum State {
    Idle,
    Active(ActiveSession),
}

/// Drives profiling sessions through their lifecycle.
///
/// A profiler starts out idle. [`begin()`](Self::begin) creates a fresh [`Session`] that
/// every measurement operation is forwarded to. [`finalize()`](Self::finalize) writes one report
/// line per measured label (optionally followed by the session total), releases the session and
/// returns the profiler to idle, ready to begin again.
///
/// Calling operations in the wrong phase is a [`UsageError`] that leaves the profiler unchanged.
/// Measurement operations forward to the active session and return its errors, including
/// [`Error::ClockUnavailable`](crate::Error::ClockUnavailable) when the clock cannot be read.
///
/// # Examples
///
/// ```
/// use block_timer::{Clock, MemorySink, Profiler, ReportSink};
///
/// let lines = MemorySink::new();
/// let mut profiler =
///     Profiler::with_clock_and_sink(Clock::monotonic(), ReportSink::Memory(lines.clone()));
///
/// profiler.begin().unwrap();
///
/// profiler.start("init").unwrap();
/// // Set up the problem.
/// profiler.stop("init").unwrap();
///
/// let report = profiler.finalize().unwrap();
///
/// assert_eq!(report.entry("init").unwrap().invocation_count(), 1);
/// assert_eq!(lines.lines().len(), 1);
/// ```
#[derive(Debug)]
pub struct Profiler {
    clock: Clock,
    sink: ReportSink,
    filter: LabelFilter,
    session_comment: String,
    report_session_total: bool,
    state: State,

    // Sink failures of sessions that were already released.
    released_sink_failures: u64,
}

impl Profiler {
    /// Creates an idle profiler that measures elapsed real time and writes report lines to
    /// stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock_and_sink(Clock::monotonic(), ReportSink::Stdout)
    }

    /// Creates an idle profiler with a specific clock and report sink.
    #[must_use]
    pub fn with_clock_and_sink(clock: Clock, sink: ReportSink) -> Self {
        let defaults = ProfilerConfig::default();

        Self {
            clock,
            sink,
            filter: LabelFilter::all(),
            session_comment: defaults.session_comment,
            report_session_total: defaults.report_session_total,
            state: State::Idle,
            released_sink_failures: 0,
        }
    }

    /// Creates an idle profiler as described by a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured clock is unavailable or the labels document exists
    /// but cannot be read.
    pub fn with_config(config: &ProfilerConfig) -> Result<Self> {
        let clock = Clock::new(config.clock)?;
        let mut profiler = Self::with_clock_and_sink(clock, config.sink.to_sink());
        profiler.filter = config.label_filter()?;
        profiler.session_comment.clone_from(&config.session_comment);
        profiler.report_session_total = config.report_session_total;
        Ok(profiler)
    }

    #[cfg(test)]
    pub(crate) fn with_platform(platform: PlatformFacade, sink: ReportSink) -> Self {
        Self::with_clock_and_sink(
            Clock::from_platform(crate::ClockKind::Monotonic, platform),
            sink,
        )
    }

    /// Restricts which labels are measured by sessions begun from now on.
    pub fn set_filter(&mut self, filter: LabelFilter) {
        self.filter = filter;
    }

    /// The current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Active(_) => Phase::Active,
        }
    }

    /// The active session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            State::Idle => None,
            State::Active(active) => Some(&active.session),
        }
    }

    /// The active session, if any, for operations the profiler does not forward itself.
    #[must_use]
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        match &mut self.state {
            State::Idle => None,
            State::Active(active) => Some(&mut active.session),
        }
    }

    /// How many report writes of this profiler's sessions went to stdout because the sink
    /// failed.
    #[must_use]
    pub fn sink_failures(&self) -> u64 {
        self.released_sink_failures
            .saturating_add(self.session().map_or(0, Session::sink_failures))
    }

    fn active_session(&mut self, operation: &str) -> Result<&mut Session> {
        self.session_mut().ok_or_else(|| {
            warn!(operation, "ignoring operation, no profiling session is active");
            UsageError::NoActiveSession.into()
        })
    }

    /// Begins a profiling session.
    ///
    /// The caller's source location tags the session total line, if
    /// [`ProfilerConfig::report_session_total`] is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SessionAlreadyActive`] if a session is already active. The active
    /// session is kept.
    #[track_caller]
    pub fn begin(&mut self) -> Result<()> {
        let origin = SourceLocation::caller();

        if matches!(self.state, State::Active(_)) {
            warn!(%origin, "ignoring begin, a profiling session is already active");
            return Err(UsageError::SessionAlreadyActive.into());
        }

        let mut session = Session::with_clock_and_sink(self.clock.clone(), self.sink.clone());
        session.set_filter(self.filter.clone());

        self.state = State::Active(ActiveSession { session, origin });
        debug!(%origin, "profiling session began");
        Ok(())
    }

    /// Registers labels in the given order without starting them.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] if no session is active.
    #[track_caller]
    pub fn declare<I, S>(&mut self, labels: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.active_session("declare")?.declare(labels);
        Ok(())
    }

    /// Starts the timer of a label. See [`Session::start()`].
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] if no session is active, otherwise the same
    /// errors as [`Session::start()`].
    #[track_caller]
    pub fn start(&mut self, label: &str) -> Result<()> {
        self.active_session("start")?.start(label)
    }

    /// Stops the timer of a label. See [`Session::stop()`].
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] if no session is active, otherwise the same
    /// errors as [`Session::stop()`].
    #[track_caller]
    pub fn stop(&mut self, label: &str) -> Result<Duration> {
        self.active_session("stop")?.stop(label)
    }

    /// Times a closure as one start/stop pair of a label. See [`Session::measure()`].
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] without calling the closure if no session is
    /// active, otherwise the same errors as [`Session::measure()`].
    #[track_caller]
    pub fn measure<R>(&mut self, label: &str, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
        self.active_session("measure")?.measure(label, f)
    }

    /// Times a closure and immediately writes one report line for it. See
    /// [`Session::time_block()`].
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] without calling the closure if no session is
    /// active, otherwise the same errors as [`Session::time_block()`].
    #[track_caller]
    pub fn time_block<R>(&mut self, comment: &str, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
        self.active_session("time_block")?.time_block(comment, f)
    }

    /// Returns the accumulated statistics of the active session, or `None` when idle.
    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.session().map(Session::snapshot)
    }

    /// Begins a loop profile. See [`Session::loop_start()`].
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] if no session is active, otherwise the same
    /// errors as [`Session::loop_start()`].
    #[track_caller]
    pub fn loop_start(&mut self, iteration_budget: u64) -> Result<()> {
        self.active_session("loop_start")?.loop_start(iteration_budget)
    }

    /// Marks the end of one loop iteration. See [`Session::record_iteration()`].
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] if no session is active, otherwise the same
    /// errors as [`Session::record_iteration()`].
    #[track_caller]
    pub fn record_iteration(&mut self) -> Result<Duration> {
        self.active_session("record_iteration")?.record_iteration()
    }

    /// Whether the driving loop should run another iteration. Always `false` when idle.
    #[must_use]
    pub fn should_continue(&self) -> bool {
        self.session().is_some_and(Session::should_continue)
    }

    /// Ends the active loop profile. See [`Session::loop_end()`].
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] if no session is active, otherwise the same
    /// errors as [`Session::loop_end()`].
    #[track_caller]
    pub fn loop_end(&mut self, comment: &str) -> Result<LoopSummary> {
        self.active_session("loop_end")?.loop_end(comment)
    }

    /// Runs a loop profile to completion. See [`Session::run_loop()`].
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] without calling `body` if no session is active,
    /// otherwise the same errors as [`Session::run_loop()`].
    #[track_caller]
    pub fn run_loop<F>(
        &mut self,
        iteration_budget: u64,
        comment: &str,
        body: F,
    ) -> Result<LoopSummary>
    where
        F: FnMut(u64) -> ControlFlow<()>,
    {
        self.active_session("run_loop")?.run_loop(iteration_budget, comment, body)
    }

    /// Reports and releases the active session, returning the profiler to idle.
    ///
    /// Writes one line per label with at least one completed measurement, in the order labels
    /// first appeared, followed by the session total line if enabled. Timers still running are
    /// reported with their completed intervals only.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveSession`] if no session is active.
    pub fn finalize(&mut self) -> Result<Report> {
        // Only an active state is ever replaced here, so an idle profiler stays idle.
        let State::Active(ActiveSession {
            mut session,
            origin,
        }) = mem::replace(&mut self.state, State::Idle)
        else {
            warn!("ignoring finalize, no profiling session is active");
            return Err(UsageError::NoActiveSession.into());
        };

        for label in session.pending() {
            warn!(label, "timer is still running at finalize, reporting completed intervals only");
        }

        let report = session.to_report();
        for line in report.lines() {
            session.emit(&line);
        }

        if self.report_session_total {
            session.emit(&ReportLine::new(
                origin,
                self.session_comment.as_str(),
                report.elapsed(),
            ));
        }

        self.released_sink_failures = self
            .released_sink_failures
            .saturating_add(session.sink_failures());
        debug!(%origin, labels = report.entries().count(), "profiling session finalized");

        Ok(report)
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}
