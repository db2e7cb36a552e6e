use std::io;
use std::time::{Duration, Instant};

use cpu_time::{ProcessTime, ThreadTime};

use crate::pal::Platform;

/// Reads the operating system clocks.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RealPlatform {
    epoch: Instant,
}

impl RealPlatform {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Platform for RealPlatform {
    fn monotonic_time(&self) -> io::Result<Duration> {
        Ok(self.epoch.elapsed())
    }

    #[cfg_attr(test, mutants::skip)] // Real processor time cannot be asserted exactly.
    fn thread_time(&self) -> io::Result<Duration> {
        ThreadTime::try_now().map(|time| time.as_duration())
    }

    #[cfg_attr(test, mutants::skip)] // Real processor time cannot be asserted exactly.
    fn process_time(&self) -> io::Result<Duration> {
        ProcessTime::try_now().map(|time| time.as_duration())
    }
}

#[cfg(test)]
#[cfg(not(miri))] // Miri cannot talk to the real platform.
mod tests {
    use super::*;

    #[test]
    fn monotonic_time_does_not_go_backwards() {
        let platform = RealPlatform::new();

        let first = platform.monotonic_time().unwrap();
        let second = platform.monotonic_time().unwrap();

        assert!(second >= first);
    }

    #[test]
    fn monotonic_time_starts_near_zero() {
        let platform = RealPlatform::new();

        assert!(platform.monotonic_time().unwrap() < Duration::from_secs(5));
    }

    #[test]
    fn processor_times_are_readable() {
        let platform = RealPlatform::new();

        platform.thread_time().unwrap();
        platform.process_time().unwrap();
    }
}
