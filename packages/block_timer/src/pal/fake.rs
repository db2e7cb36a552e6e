//! Fake platform implementation for testing.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use foldhash::HashMap;

use crate::pal::abstractions::Platform;

const ERR_POISONED_FAKE: &str = "FakePlatform state lock should not be poisoned";

/// Internal state for the fake platform that can be shared between clones.
#[derive(Debug, Default)]
struct FakePlatformState {
    monotonic_time: Duration,
    thread_times: HashMap<ThreadId, Duration>,
    process_time: Duration,
    unavailable: bool,
}

/// Fake implementation of the platform abstraction for testing.
///
/// Multiple clones of the same `FakePlatform` share the same underlying time state, allowing
/// tests to move time forward after a clock or session has been created from it. Thread
/// processor time is kept per thread, like the real thing.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakePlatform {
    state: Arc<Mutex<FakePlatformState>>,
}

impl FakePlatform {
    /// Creates a new fake platform with all clocks at zero.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Moves every clock forward by the same amount, as if the calling thread was busy
    /// for the whole interval.
    pub(crate) fn advance(&self, by: Duration) {
        let mut state = self.state.lock().expect(ERR_POISONED_FAKE);
        state.monotonic_time = state.monotonic_time.saturating_add(by);
        state.process_time = state.process_time.saturating_add(by);

        let thread_time = state
            .thread_times
            .entry(thread::current().id())
            .or_default();
        *thread_time = thread_time.saturating_add(by);
    }

    /// Moves only the monotonic clock forward, as if the calling thread was idle.
    pub(crate) fn advance_idle(&self, by: Duration) {
        let mut state = self.state.lock().expect(ERR_POISONED_FAKE);
        state.monotonic_time = state.monotonic_time.saturating_add(by);
    }

    /// Makes every subsequent read fail (or succeed again).
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().expect(ERR_POISONED_FAKE).unavailable = unavailable;
    }

    fn read(&self, pick: impl FnOnce(&FakePlatformState) -> Duration) -> io::Result<Duration> {
        let state = self.state.lock().expect(ERR_POISONED_FAKE);

        if state.unavailable {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "fake clock is unavailable",
            ));
        }

        Ok(pick(&state))
    }
}

impl Platform for FakePlatform {
    fn monotonic_time(&self) -> io::Result<Duration> {
        self.read(|state| state.monotonic_time)
    }

    fn thread_time(&self) -> io::Result<Duration> {
        let current = thread::current().id();
        self.read(|state| {
            state
                .thread_times
                .get(&current)
                .copied()
                .unwrap_or_default()
        })
    }

    fn process_time(&self) -> io::Result<Duration> {
        self.read(|state| state.process_time)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn initializes_with_zero_time() {
        let platform = FakePlatform::new();

        assert_eq!(platform.monotonic_time().unwrap(), Duration::ZERO);
        assert_eq!(platform.thread_time().unwrap(), Duration::ZERO);
        assert_eq!(platform.process_time().unwrap(), Duration::ZERO);
    }

    #[test]
    fn advance_moves_all_clocks() {
        let platform = FakePlatform::new();
        platform.advance(Duration::from_millis(150));

        assert_eq!(platform.monotonic_time().unwrap(), Duration::from_millis(150));
        assert_eq!(platform.thread_time().unwrap(), Duration::from_millis(150));
        assert_eq!(platform.process_time().unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn advance_idle_moves_only_monotonic_clock() {
        let platform = FakePlatform::new();
        platform.advance_idle(Duration::from_millis(40));

        assert_eq!(platform.monotonic_time().unwrap(), Duration::from_millis(40));
        assert_eq!(platform.thread_time().unwrap(), Duration::ZERO);
    }

    #[test]
    fn unavailable_platform_fails_reads() {
        let platform = FakePlatform::new();
        platform.set_unavailable(true);

        assert!(platform.monotonic_time().is_err());

        platform.set_unavailable(false);
        assert!(platform.monotonic_time().is_ok());
    }

    #[test]
    fn thread_time_is_per_thread() {
        let platform = FakePlatform::new();
        platform.advance(Duration::from_millis(200));

        let worker = platform.clone();
        let worker_time = thread::spawn(move || {
            let before = worker.thread_time().unwrap();
            worker.advance(Duration::from_millis(5));
            (before, worker.thread_time().unwrap())
        })
        .join()
        .unwrap();

        assert_eq!(worker_time, (Duration::ZERO, Duration::from_millis(5)));
        assert_eq!(platform.thread_time().unwrap(), Duration::from_millis(200));
        assert_eq!(platform.process_time().unwrap(), Duration::from_millis(205));
    }

    #[test]
    fn shared_state_between_clones() {
        let platform1 = FakePlatform::new();
        let platform2 = platform1.clone();

        platform1.advance(Duration::from_millis(100));
        assert_eq!(platform2.monotonic_time().unwrap(), Duration::from_millis(100));
    }
}
