use std::cell::Cell;
use std::fmt::{self, Debug, Display};
use std::io;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error};

use crate::pal::{Platform, PlatformFacade};
use crate::{Error, Result};

/// Which time base a [`Clock`] measures.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ClockKind {
    /// Elapsed real time from a monotonic source, unaffected by wall clock adjustments.
    #[default]
    Monotonic,

    /// Processor time consumed by the calling thread.
    ///
    /// Use this inside parallel regions, where every worker owns its own session and should
    /// only be charged for its own work.
    ///
    /// Readings of different threads are unrelated. A clock of this kind belongs to the thread
    /// that last read it: the first reading on another thread rebinds the clock to that thread
    /// and starts its readings afresh. A clock can therefore be created on one thread and moved
    /// to a worker, but an interval that starts on one thread and ends on another does not
    /// measure anything meaningful.
    ThreadCpu,

    /// Processor time consumed by the whole process, across all threads.
    ProcessCpu,

    /// Time reported by a caller-supplied [`EventSource`], such as an accelerator event timer.
    #[serde(skip)]
    Event,
}

impl Display for ClockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Monotonic => "monotonic",
            Self::ThreadCpu => "thread processor time",
            Self::ProcessCpu => "process processor time",
            Self::Event => "event",
        };

        f.write_str(name)
    }
}

/// A caller-supplied time base, for devices that time their own work.
///
/// Readings are durations since an epoch of the implementation's choosing. The epoch must not
/// change for the lifetime of the source and readings must never decrease.
///
/// # Examples
///
/// ```
/// use std::io;
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// use block_timer::{Clock, EventSource};
///
/// #[derive(Debug)]
/// struct DeviceEvents {
///     epoch: Instant,
/// }
///
/// impl EventSource for DeviceEvents {
///     fn now(&self) -> io::Result<Duration> {
///         // A real implementation would record and synchronize a device event here.
///         Ok(self.epoch.elapsed())
///     }
/// }
///
/// let clock = Clock::from_event_source(Arc::new(DeviceEvents {
///     epoch: Instant::now(),
/// }));
/// let start = clock.now();
/// let end = clock.now();
/// assert!(end >= start);
/// ```
pub trait EventSource: Debug + Send + Sync {
    /// Returns the current reading of the time base.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying device cannot be read.
    fn now(&self) -> io::Result<Duration>;
}

/// An opaque point in time captured from a [`Clock`].
///
/// Timestamps are only meaningful as a difference between two captures of the same clock.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Timestamp {
    since_epoch: Duration,
}

impl Timestamp {
    /// Calculates the duration since an earlier timestamp.
    ///
    /// If `earlier` is actually later than this timestamp, returns a duration of zero.
    #[must_use]
    pub fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.since_epoch.saturating_sub(earlier.since_epoch)
    }
}

#[derive(Clone, Debug)]
enum Source {
    Platform(PlatformFacade),
    Event(Arc<dyn EventSource>),
}

/// Source of [`Timestamp`]s for a session.
///
/// Every clock guarantees that consecutive timestamps of one thread never decrease.
/// [`try_now()`](Self::try_now) reports a failed reading to the caller, while
/// [`now()`](Self::now) logs the failure and repeats the most recent successful reading.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use block_timer::Clock;
///
/// let clock = Clock::monotonic();
/// let start = clock.now();
/// std::thread::sleep(Duration::from_millis(2));
/// let end = clock.now();
///
/// assert!(Clock::elapsed(start, end) >= Duration::from_millis(2));
/// ```
#[derive(Clone, Debug)]
pub struct Clock {
    kind: ClockKind,
    source: Source,
    last: Cell<Timestamp>,

    // Thread whose readings `last` holds. Only tracked for thread processor time.
    owner: Cell<Option<ThreadId>>,
}

impl Clock {
    /// Creates a clock measuring elapsed real time.
    #[must_use]
    pub fn monotonic() -> Self {
        Self::from_platform(ClockKind::Monotonic, PlatformFacade::real())
    }

    /// Creates a clock of the given kind, verifying that it can be read on this platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockUnavailable`] if the platform cannot provide the requested time
    /// base. [`ClockKind::Event`] clocks cannot be created this way; use
    /// [`from_event_source()`](Self::from_event_source).
    pub fn new(kind: ClockKind) -> Result<Self> {
        Self::probed(kind, PlatformFacade::real())
    }

    /// Creates a clock backed by a caller-supplied time base.
    #[must_use]
    pub fn from_event_source(source: Arc<dyn EventSource>) -> Self {
        Self {
            kind: ClockKind::Event,
            source: Source::Event(source),
            last: Cell::new(Timestamp::default()),
            owner: Cell::new(None),
        }
    }

    pub(crate) fn from_platform(kind: ClockKind, platform: PlatformFacade) -> Self {
        Self {
            kind,
            source: Source::Platform(platform),
            last: Cell::new(Timestamp::default()),
            owner: Cell::new(None),
        }
    }

    pub(crate) fn probed(kind: ClockKind, platform: PlatformFacade) -> Result<Self> {
        let clock = Self::from_platform(kind, platform);
        clock.try_now()?;

        Ok(clock)
    }

    /// The time base this clock measures.
    #[must_use]
    pub fn kind(&self) -> ClockKind {
        self.kind
    }

    /// Captures the current timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockUnavailable`] if the time base cannot be read.
    pub fn try_now(&self) -> Result<Timestamp> {
        self.follow_current_thread();

        let since_epoch = self.read().map_err(|source| Error::ClockUnavailable {
            kind: self.kind,
            source,
        })?;

        let timestamp = Timestamp { since_epoch }.max(self.last.get());
        self.last.set(timestamp);
        Ok(timestamp)
    }

    /// Captures the current timestamp, repeating the last successful reading if the time base
    /// cannot be read.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.try_now().unwrap_or_else(|e| {
            error!(error = %e, "clock read failed, repeating the last reading");
            self.last.get()
        })
    }

    /// Returns the time that passed between two timestamps of the same clock.
    ///
    /// Returns zero if `end` was captured before `start`.
    #[must_use]
    pub fn elapsed(start: Timestamp, end: Timestamp) -> Duration {
        end.saturating_duration_since(start)
    }

    /// Returns the time that passed between two timestamps of the same clock, in seconds.
    #[must_use]
    pub fn elapsed_secs(start: Timestamp, end: Timestamp) -> f64 {
        Self::elapsed(start, end).as_secs_f64()
    }

    fn follow_current_thread(&self) {
        if self.kind != ClockKind::ThreadCpu {
            return;
        }

        let current = thread::current().id();
        let previous = self.owner.replace(Some(current));

        if previous != Some(current) {
            if previous.is_some() {
                debug!(?current, "thread processor time clock moved to another thread");
            }

            self.last.set(Timestamp::default());
        }
    }

    fn read(&self) -> io::Result<Duration> {
        match &self.source {
            Source::Event(source) => source.now(),
            Source::Platform(platform) => match self.kind {
                ClockKind::Monotonic => platform.monotonic_time(),
                ClockKind::ThreadCpu => platform.thread_time(),
                ClockKind::ProcessCpu => platform.process_time(),
                ClockKind::Event => Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "event clocks must be created from an event source",
                )),
            },
        }
    }
}
