use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

use tracing::{error, trace, warn};

use crate::loop_profiler::LoopSession;
#[cfg(test)]
use crate::pal::PlatformFacade;
use crate::registry::TimerRegistry;
use crate::sink::ReportWriter;
use crate::{
    Clock, LabelFilter, LoopSummary, ProfilerConfig, Report, ReportLine, ReportSink, Result,
    Snapshot, SourceLocation, Timestamp, UsageError,
};

/// Holds every measurement of one thread of control.
///
/// A session owns a clock, the named timers and at most one active loop profile. All mutation
/// goes through `&mut self` in program order, so a session needs no locking. Every worker of a
/// parallel region should own its own session; combine the results afterwards with
/// [`Report::merge()`].
///
/// Protocol violations (stopping a timer that is not running, starting a second loop profile and
/// so on) are reported as [`Error::Usage`](crate::Error::Usage). A clock that cannot be read is
/// reported as [`Error::ClockUnavailable`](crate::Error::ClockUnavailable). Either way the
/// rejected operation has no effect.
///
/// # Examples
///
/// ```
/// use block_timer::Session;
///
/// let mut session = Session::new();
///
/// session.start("assemble").unwrap();
/// // Assemble the system matrix.
/// session.stop("assemble").unwrap();
///
/// let solution = session
///     .measure("solve", |_| {
///         // Solve the system.
///         42
///     })
///     .unwrap();
///
/// let snapshot = session.snapshot();
/// assert_eq!(snapshot.get("assemble").unwrap().invocation_count(), 1);
/// assert_eq!(snapshot.get("solve").unwrap().invocation_count(), 1);
/// assert_eq!(solution, 42);
/// ```
#[derive(Debug)]
pub struct Session {
    clock: Clock,
    registry: TimerRegistry,
    active_loop: Option<LoopSession>,
    filter: LabelFilter,
    writer: ReportWriter,
    started_at: Timestamp,
}

impl Session {
    /// Creates a session that measures elapsed real time and writes report lines to stdout.
    #[expect(
        clippy::new_without_default,
        reason = "a session starts measuring when created, which is not what a default value does"
    )]
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock_and_sink(Clock::monotonic(), ReportSink::Stdout)
    }

    /// Creates a session with a specific clock and report sink.
    #[must_use]
    pub fn with_clock_and_sink(clock: Clock, sink: ReportSink) -> Self {
        let started_at = clock.now();

        Self {
            clock,
            registry: TimerRegistry::new(),
            active_loop: None,
            filter: LabelFilter::all(),
            writer: ReportWriter::new(sink),
            started_at,
        }
    }

    /// Creates a session as described by a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured clock is unavailable or the labels document exists
    /// but cannot be read.
    pub fn from_config(config: &ProfilerConfig) -> Result<Self> {
        let clock = Clock::new(config.clock)?;
        let mut session = Self::with_clock_and_sink(clock, config.sink.to_sink());
        session.set_filter(config.label_filter()?);
        Ok(session)
    }

    #[cfg(test)]
    pub(crate) fn with_platform(platform: PlatformFacade, sink: ReportSink) -> Self {
        Self::with_clock_and_sink(
            Clock::from_platform(crate::ClockKind::Monotonic, platform),
            sink,
        )
    }

    /// Restricts which labels are measured.
    ///
    /// `start` and `stop` calls for labels outside the filter succeed without measuring anything
    /// and such labels never appear in snapshots or reports. Labels already measured are kept,
    /// and a timer that is already running can still be stopped.
    pub fn set_filter(&mut self, filter: LabelFilter) {
        self.filter = filter;
    }

    /// The clock this session measures with.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The sink report lines are written to.
    #[must_use]
    pub fn sink(&self) -> &ReportSink {
        self.writer.sink()
    }

    /// How many report writes could not be delivered to the sink and went to stdout instead.
    #[must_use]
    pub fn sink_failures(&self) -> u64 {
        self.writer.failures()
    }

    /// Time since the session was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Clock::elapsed(self.started_at, self.clock.now())
    }

    /// Registers labels in the given order without starting them.
    ///
    /// Reports list labels in the order they first appeared, so declaring the labels of a
    /// profiled region up front fixes the report order regardless of which timer starts first.
    #[track_caller]
    pub fn declare<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let location = SourceLocation::caller();

        for label in labels {
            let label = label.as_ref();
            if self.filter.allows(label) {
                self.registry.declare(label, location);
            }
        }
    }

    /// Starts the timer of a label.
    ///
    /// The first start of a label records the caller's source location, which is what reports
    /// show for the label.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::AlreadyRunning`] if the timer already has an unmatched start. The
    /// original start is kept. Returns [`Error::ClockUnavailable`](crate::Error::ClockUnavailable)
    /// if the clock cannot be read, in which case the timer is not started.
    #[track_caller]
    pub fn start(&mut self, label: &str) -> Result<()> {
        self.start_at(label, SourceLocation::caller())
    }

    fn start_at(&mut self, label: &str, location: SourceLocation) -> Result<()> {
        if !self.filter.allows(label) {
            trace!(label, "label is not instrumented, ignoring start");
            return Ok(());
        }

        let now = read_clock(&self.clock, location)?;
        self.registry
            .start(label, now, location)
            .inspect_err(|e| warn!(%location, error = %e, "ignoring start"))?;
        Ok(())
    }

    /// Stops the timer of a label, returning the length of the interval that just ended.
    ///
    /// Labels outside the filter return a zero interval, unless their timer was started before
    /// the filter excluded them.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NotRunning`] if the timer has no unmatched start. Returns
    /// [`Error::ClockUnavailable`](crate::Error::ClockUnavailable) if the clock cannot be read,
    /// in which case the timer keeps running. Either way nothing is recorded.
    #[track_caller]
    pub fn stop(&mut self, label: &str) -> Result<Duration> {
        self.stop_at(label, SourceLocation::caller())
    }

    fn stop_at(&mut self, label: &str, location: SourceLocation) -> Result<Duration> {
        if !self.filter.allows(label) && !self.registry.is_running(label) {
            trace!(label, "label is not instrumented, ignoring stop");
            return Ok(Duration::ZERO);
        }

        let now = read_clock(&self.clock, location)?;
        let interval = self
            .registry
            .stop(label, now)
            .inspect_err(|e| warn!(%location, error = %e, "ignoring stop"))?;
        Ok(interval)
    }

    /// Times a closure as one start/stop pair of a label.
    ///
    /// The closure receives the session so it can open nested measurements.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`start()`](Self::start) without calling the closure. If the clock
    /// cannot be read once the closure has returned, the closure's value is dropped, the error
    /// is returned and the label stays running.
    #[track_caller]
    pub fn measure<R>(&mut self, label: &str, f: impl FnOnce(&mut Self) -> R) -> Result<R> {
        let location = SourceLocation::caller();

        self.start_at(label, location)?;
        let result = f(self);

        // The closure may have stopped the timer itself; that pair then already counts.
        if self.registry.is_running(label) {
            self.stop_at(label, location)?;
        }

        Ok(result)
    }

    /// Times a closure and immediately writes one report line for it.
    ///
    /// The block is not recorded in the timer registry, so it does not appear in snapshots or
    /// in the final report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockUnavailable`](crate::Error::ClockUnavailable) if the clock cannot be
    /// read. The closure is not called if the first reading fails; if the second one fails, the
    /// closure's value is dropped. No line is written in either case.
    #[track_caller]
    pub fn time_block<R>(&mut self, comment: &str, f: impl FnOnce(&mut Self) -> R) -> Result<R> {
        let location = SourceLocation::caller();

        let start = read_clock(&self.clock, location)?;
        let result = f(self);
        let end = read_clock(&self.clock, location)?;

        let line = ReportLine::new(location, comment, Clock::elapsed(start, end));
        self.emit(&line);
        Ok(result)
    }

    /// Whether a label has an unmatched start.
    #[must_use]
    pub fn is_running(&self, label: &str) -> bool {
        self.registry.is_running(label)
    }

    /// Labels with an unmatched start, in order of first appearance.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.registry.pending()
    }

    /// Returns the accumulated statistics of every known label.
    ///
    /// Intervals still running are not included until they are stopped.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.registry.snapshot()
    }

    /// Begins a loop profile that expects `iteration_budget` iterations.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::LoopAlreadyActive`] if a loop profile is already active,
    /// [`UsageError::ZeroIterationBudget`] if the budget is zero and
    /// [`Error::ClockUnavailable`](crate::Error::ClockUnavailable) if the clock cannot be read.
    /// No loop profile is started in any of these cases.
    #[track_caller]
    pub fn loop_start(&mut self, iteration_budget: u64) -> Result<()> {
        let location = SourceLocation::caller();

        if self.active_loop.is_some() {
            warn!(%location, "ignoring loop_start, a loop profile is already active");
            return Err(UsageError::LoopAlreadyActive.into());
        }

        let now = read_clock(&self.clock, location)?;
        self.active_loop = Some(LoopSession::start(iteration_budget, now, location)?);
        Ok(())
    }

    /// Marks the end of one loop iteration, returning how long the iteration took.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveLoop`] if no loop profile is active and
    /// [`Error::ClockUnavailable`](crate::Error::ClockUnavailable) if the clock cannot be read.
    /// Nothing is recorded in either case.
    #[track_caller]
    pub fn record_iteration(&mut self) -> Result<Duration> {
        let location = SourceLocation::caller();

        let active = self.active_loop.as_mut().ok_or(UsageError::NoActiveLoop)?;
        let now = read_clock(&self.clock, location)?;
        Ok(active.record(now))
    }

    /// Whether the driving loop should run another iteration.
    ///
    /// Returns `false` once the iteration budget has been recorded, and whenever no loop
    /// profile is active.
    #[must_use]
    pub fn should_continue(&self) -> bool {
        self.active_loop
            .as_ref()
            .is_some_and(LoopSession::should_continue)
    }

    /// Ends the active loop profile and writes its summary to the report sink.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NoActiveLoop`] if no loop profile is active and
    /// [`Error::ClockUnavailable`](crate::Error::ClockUnavailable) if the clock cannot be read.
    /// In the latter case the loop profile stays active.
    #[track_caller]
    pub fn loop_end(&mut self, comment: &str) -> Result<LoopSummary> {
        let location = SourceLocation::caller();

        if self.active_loop.is_none() {
            warn!(%location, "ignoring loop_end, no loop profile is active");
            return Err(UsageError::NoActiveLoop.into());
        }

        let now = read_clock(&self.clock, location)?;
        let active = self.active_loop.take().ok_or(UsageError::NoActiveLoop)?;

        let summary = active.finish(comment, now);
        self.emit(&summary);
        Ok(summary)
    }

    /// Runs a loop profile to completion.
    ///
    /// Calls `body` with the zero-based iteration index until the iteration budget is used up
    /// or `body` returns [`ControlFlow::Break`]. The iteration that breaks is still recorded.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`loop_start()`](Self::loop_start). If the clock cannot be
    /// read after the loop has started, the loop profile is discarded and
    /// [`Error::ClockUnavailable`](crate::Error::ClockUnavailable) is returned.
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
        let location = SourceLocation::caller();

        self.loop_start(iteration_budget)?;

        let summary = self
            .drive_loop(body, location)
            .and_then(|()| self.loop_end(comment));

        if summary.is_err() {
            warn!(%location, "discarding loop profile, the clock could not be read");
            self.active_loop = None;
        }

        summary
    }

    fn drive_loop<F>(&mut self, mut body: F, location: SourceLocation) -> Result<()>
    where
        F: FnMut(u64) -> ControlFlow<()>,
    {
        let mut index: u64 = 0;

        while self.should_continue() {
            let flow = body(index);

            let now = read_clock(&self.clock, location)?;
            if let Some(active) = self.active_loop.as_mut() {
                active.record(now);
            }
            index = index.saturating_add(1);

            if flow.is_break() {
                break;
            }
        }

        Ok(())
    }

    /// Creates a report of every label with at least one completed measurement.
    #[must_use]
    pub fn to_report(&self) -> Report {
        Report::new(self.registry.report_entries(), self.elapsed())
    }

    pub(crate) fn emit(&mut self, item: &impl fmt::Display) {
        self.writer.emit(&item.to_string());
    }
}

fn read_clock(clock: &Clock, location: SourceLocation) -> Result<Timestamp> {
    clock
        .try_now()
        .inspect_err(|e| error!(%location, error = %e, "clock read failed, nothing was recorded"))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use std::thread;

    use super::*;
    use crate::error::expect_usage_error;
    use crate::pal::FakePlatform;
    use crate::{ClockKind, Error, MemorySink};

    fn create_test_session() -> (Session, FakePlatform, MemorySink) {
        let platform = FakePlatform::new();
        let memory = MemorySink::new();
        let session = Session::with_platform(
            PlatformFacade::fake(platform.clone()),
            ReportSink::Memory(memory.clone()),
        );
        (session, platform, memory)
    }

    #[test]
    fn invocation_count_matches_completed_pairs() {
        let (mut session, platform, _) = create_test_session();

        for i in 0..4 {
            session.start("a").unwrap();
            if i % 2 == 0 {
                session.start("b").unwrap();
            }
            platform.advance(Duration::from_millis(1));
            session.stop("a").unwrap();
            if i % 2 == 0 {
                session.stop("b").unwrap();
            }
        }

        let snapshot = session.snapshot();
        assert_eq!(snapshot.get("a").unwrap().invocation_count(), 4);
        assert_eq!(snapshot.get("b").unwrap().invocation_count(), 2);
    }

    #[test]
    fn unmatched_stop_leaves_snapshot_unchanged() {
        let (mut session, platform, _) = create_test_session();
        session.start("x").unwrap();
        platform.advance(Duration::from_millis(3));
        session.stop("x").unwrap();
        let before = session.snapshot();

        assert!(matches!(
            expect_usage_error(session.stop("x")),
            UsageError::NotRunning { .. }
        ));
        assert!(matches!(
            expect_usage_error(session.stop("y")),
            UsageError::NotRunning { .. }
        ));

        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let (mut session, platform, _) = create_test_session();
        session.start("x").unwrap();
        platform.advance(Duration::from_millis(3));
        session.stop("x").unwrap();
        session.start("y").unwrap();

        let first = session.snapshot();
        platform.advance(Duration::from_millis(50));
        let second = session.snapshot();

        assert_eq!(first, second);
    }

    #[test]
    fn filtered_labels_are_not_measured() {
        let (mut session, platform, _) = create_test_session();
        session.set_filter(LabelFilter::only(["kept"]));

        session.start("kept").unwrap();
        session.start("dropped").unwrap();
        platform.advance(Duration::from_millis(2));
        session.stop("kept").unwrap();
        assert_eq!(session.stop("dropped").unwrap(), Duration::ZERO);

        // Unmatched stops of filtered labels are not errors either.
        assert_eq!(session.stop("dropped").unwrap(), Duration::ZERO);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("dropped").is_none());
    }

    #[test]
    fn measure_times_the_closure() {
        let (mut session, platform, _) = create_test_session();

        let value = session
            .measure("outer", |session| {
                platform.advance(Duration::from_millis(5));
                session
                    .measure("inner", |_| platform.advance(Duration::from_millis(2)))
                    .unwrap();
                7
            })
            .unwrap();

        assert_eq!(value, 7);
        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.get("outer").unwrap().accumulated(),
            Duration::from_millis(7)
        );
        assert_eq!(
            snapshot.get("inner").unwrap().accumulated(),
            Duration::from_millis(2)
        );
    }

    #[test]
    fn measure_does_not_run_closure_for_running_label() {
        let (mut session, _, _) = create_test_session();
        session.start("busy").unwrap();

        let mut called = false;
        let result = session.measure("busy", |_| called = true);

        assert!(matches!(
            expect_usage_error(result),
            UsageError::AlreadyRunning { .. }
        ));
        assert!(!called);
        assert!(session.is_running("busy"));
    }

    #[test]
    fn measure_tolerates_closure_stopping_the_label() {
        let (mut session, _, _) = create_test_session();

        session
            .measure("self_stopping", |session| {
                session.stop("self_stopping").unwrap();
            })
            .unwrap();

        assert_eq!(
            session
                .snapshot()
                .get("self_stopping")
                .unwrap()
                .invocation_count(),
            1
        );
    }

    #[test]
    fn time_block_writes_one_line() {
        let (mut session, platform, memory) = create_test_session();

        session
            .time_block("setup", |_| platform.advance(Duration::from_millis(10)))
            .unwrap();

        let lines = memory.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("setup: Elapsed time (sec):         1.000000E-02"));
        assert!(lines[0].contains("session.rs:"));
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn loop_budget_stops_continuation() {
        let (mut session, platform, memory) = create_test_session();

        session.loop_start(5).unwrap();
        for _ in 0..5 {
            assert!(session.should_continue());
            platform.advance(Duration::from_millis(2));
            session.record_iteration().unwrap();
        }
        assert!(!session.should_continue());

        let summary = session.loop_end("bench").unwrap();
        assert_eq!(summary.sample_count(), 5);
        assert_eq!(summary.mean(), Duration::from_millis(2));

        assert_eq!(
            expect_usage_error(session.loop_end("bench")),
            UsageError::NoActiveLoop
        );
        assert!(!session.should_continue());

        let lines = memory.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("bench: Elapsed time (sec):         2.000000E-03"));
    }

    #[test]
    fn nested_loop_start_is_rejected() {
        let (mut session, _, _) = create_test_session();
        session.loop_start(3).unwrap();

        assert_eq!(
            expect_usage_error(session.loop_start(2)),
            UsageError::LoopAlreadyActive
        );

        // The original loop profile is untouched.
        session.record_iteration().unwrap();
        assert_eq!(session.loop_end("outer").unwrap().iteration_budget(), 3);
    }

    #[test]
    fn record_without_loop_is_rejected() {
        let (mut session, _, _) = create_test_session();

        assert_eq!(
            expect_usage_error(session.record_iteration()),
            UsageError::NoActiveLoop
        );
    }

    #[test]
    fn run_loop_honours_break() {
        let (mut session, platform, _) = create_test_session();

        let summary = session
            .run_loop(10, "converge", |index| {
                platform.advance(Duration::from_millis(1));
                if index == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();

        assert_eq!(summary.sample_count(), 4);
        assert!(summary.cancelled_early());
        assert!(!session.should_continue());
    }

    #[test]
    fn run_loop_uses_whole_budget() {
        let (mut session, _, _) = create_test_session();

        let mut seen = Vec::new();
        let summary = session
            .run_loop(3, "all", |index| {
                seen.push(index);
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(summary.sample_count(), 3);
    }

    #[test]
    fn report_lists_completed_labels_in_first_start_order() {
        let (mut session, platform, _) = create_test_session();
        session.declare(["second", "first"]);

        session.start("first").unwrap();
        platform.advance(Duration::from_millis(1));
        session.stop("first").unwrap();
        session.start("second").unwrap();
        platform.advance(Duration::from_millis(1));
        session.stop("second").unwrap();
        session.start("unfinished").unwrap();

        let report = session.to_report();
        let labels: Vec<_> = report.entries().map(|entry| entry.label().to_owned()).collect();
        assert_eq!(labels, vec!["second", "first"]);
        assert_eq!(report.elapsed(), Duration::from_millis(2));
    }

    #[test]
    fn unwritable_sink_is_reported_by_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::with_platform(
            PlatformFacade::fake(FakePlatform::new()),
            ReportSink::File(dir.path().to_path_buf()),
        );

        session.time_block("lost?", |_| {}).unwrap();

        assert_eq!(session.sink_failures(), 1);
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
    fn from_config_applies_sink_and_filter() {
        let config =
            ProfilerConfig::from_toml_str("labels = [\"kept\"]\n\n[sink]\nkind = \"memory\"\n")
                .unwrap();
        let mut session = Session::from_config(&config).unwrap();

        session.start("dropped").unwrap();
        session.stop("dropped").unwrap();
        session.time_block("block", |_| {}).unwrap();

        let ReportSink::Memory(memory) = session.sink() else {
            panic!("configured memory sink must be used");
        };
        assert_eq!(memory.lines().len(), 1);
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn unreadable_clock_does_not_start_anything() {
        let (mut session, platform, memory) = create_test_session();
        platform.set_unavailable(true);

        assert!(matches!(session.start("x"), Err(Error::ClockUnavailable { .. })));
        assert!(!session.is_running("x"));
        assert!(session.snapshot().is_empty());

        let mut called = false;
        assert!(matches!(
            session.time_block("block", |_| called = true),
            Err(Error::ClockUnavailable { .. })
        ));
        assert!(!called);
        assert!(memory.lines().is_empty());

        assert!(matches!(session.loop_start(3), Err(Error::ClockUnavailable { .. })));
        assert!(!session.should_continue());
    }

    #[test]
    fn unreadable_clock_at_stop_keeps_timer_running() {
        let (mut session, platform, _) = create_test_session();
        session.start("gpu").unwrap();
        platform.advance(Duration::from_millis(10));

        platform.set_unavailable(true);
        assert!(matches!(session.stop("gpu"), Err(Error::ClockUnavailable { .. })));
        assert!(session.is_running("gpu"));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.get("gpu").unwrap().invocation_count(), 0);

        platform.set_unavailable(false);
        platform.advance(Duration::from_millis(5));
        assert_eq!(session.stop("gpu").unwrap(), Duration::from_millis(15));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.get("gpu").unwrap().invocation_count(), 1);
    }

    #[test]
    fn unreadable_clock_leaves_loop_profile_untouched() {
        let (mut session, platform, _) = create_test_session();
        session.loop_start(3).unwrap();
        platform.advance(Duration::from_millis(1));
        session.record_iteration().unwrap();

        platform.set_unavailable(true);
        assert!(matches!(
            session.record_iteration(),
            Err(Error::ClockUnavailable { .. })
        ));
        assert!(matches!(
            session.loop_end("partial"),
            Err(Error::ClockUnavailable { .. })
        ));

        platform.set_unavailable(false);
        assert!(session.should_continue());
        let summary = session.loop_end("partial").unwrap();
        assert_eq!(summary.sample_count(), 1);
        assert_eq!(summary.mean(), Duration::from_millis(1));
    }

    #[test]
    fn run_loop_discards_profile_when_clock_fails() {
        let (mut session, platform, memory) = create_test_session();

        let result = session.run_loop(5, "flaky", |index| {
            if index == 1 {
                platform.set_unavailable(true);
            }
            ControlFlow::Continue(())
        });

        assert!(matches!(result, Err(Error::ClockUnavailable { .. })));
        assert!(!session.should_continue());
        assert!(memory.lines().is_empty());

        platform.set_unavailable(false);
        session
            .run_loop(1, "again", |_| ControlFlow::Continue(()))
            .unwrap();
        assert_eq!(memory.lines().len(), 2);
    }

    #[test]
    fn running_timer_can_be_stopped_after_filter_excludes_it() {
        let (mut session, platform, _) = create_test_session();
        session.start("late").unwrap();
        platform.advance(Duration::from_millis(3));

        session.set_filter(LabelFilter::only(["other"]));

        assert_eq!(session.stop("late").unwrap(), Duration::from_millis(3));
        assert_eq!(session.pending().count(), 0);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.get("late").unwrap().invocation_count(), 1);

        // From now on the label is ignored.
        session.start("late").unwrap();
        assert!(!session.is_running("late"));
    }

    #[test]
    fn thread_clock_session_measures_after_moving_to_worker() {
        let platform = FakePlatform::new();
        platform.advance(Duration::from_millis(200));
        let facade = PlatformFacade::fake(platform.clone());
        let clock = Clock::from_platform(ClockKind::ThreadCpu, facade);
        let mut session = Session::with_clock_and_sink(clock, ReportSink::Stdout);

        let snapshot = thread::spawn(move || {
            session
                .measure("work", |_| platform.advance(Duration::from_millis(50)))
                .unwrap();
            session.snapshot()
        })
        .join()
        .unwrap();

        assert_eq!(
            snapshot.get("work").unwrap().accumulated(),
            Duration::from_millis(50)
        );
    }

    assert_impl_all!(Session: Send);
    assert_not_impl_any!(Session: Sync);
}
