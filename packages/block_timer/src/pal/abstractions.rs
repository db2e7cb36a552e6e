//! Platform abstraction trait definitions.

use std::fmt::Debug;
use std::io;
use std::time::Duration;

/// Provides the raw time readings that clocks are built from.
///
/// Every reading is a duration since some platform-defined epoch that stays fixed for the
/// lifetime of the platform instance. Readings of the same kind are monotonically non-decreasing.
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Elapsed real time, unaffected by wall clock adjustments.
    fn monotonic_time(&self) -> io::Result<Duration>;

    /// Processor time consumed by the calling thread.
    fn thread_time(&self) -> io::Result<Duration>;

    /// Processor time consumed by the whole process.
    fn process_time(&self) -> io::Result<Duration>;
}
