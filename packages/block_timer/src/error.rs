use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;

use thiserror::Error;

use crate::ClockKind;

/// A caller-protocol violation.
///
/// The operation that reported the error was not performed and the session it was issued
/// against is left exactly as it was before the call.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum UsageError {
    /// `start` was called for a label that already has an unmatched `start`.
    #[error("timer '{label}' is already running")]
    AlreadyRunning {
        /// The label of the timer.
        label: String,
    },

    /// `stop` was called for a label without an unmatched `start`.
    #[error("timer '{label}' is not running")]
    NotRunning {
        /// The label of the timer.
        label: String,
    },

    /// `loop_start` was called while another loop profile was active.
    #[error("a loop profile is already active")]
    LoopAlreadyActive,

    /// A loop operation was called without an active loop profile.
    #[error("no loop profile is active")]
    NoActiveLoop,

    /// `loop_start` was called with an iteration budget of zero.
    #[error("loop iteration budget must be non-zero")]
    ZeroIterationBudget,

    /// `begin` was called while a profiling session was already active.
    #[error("a profiling session is already active")]
    SessionAlreadyActive,

    /// A session operation was called while no profiling session was active.
    #[error("no profiling session is active")]
    NoActiveSession,
}

/// Errors that can occur when setting up profiling or when using the file and string helpers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller violated the profiling protocol.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// The requested clock cannot be read on this platform.
    #[error("the {kind} clock is unavailable")]
    ClockUnavailable {
        /// The clock that was requested.
        kind: ClockKind,

        /// The platform failure that prevented reading the clock.
        #[source]
        source: io::Error,
    },

    /// The profiler configuration could not be parsed.
    #[error("invalid profiler configuration")]
    InvalidConfig {
        /// The parser failure.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// An I/O operation on a path failed.
    #[error("I/O failure on '{}'", path.display())]
    Io {
        /// The path the operation was applied to.
        path: PathBuf,

        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// A foreign buffer was described with a length larger than the buffer itself.
    #[error("length {length} exceeds the {capacity} byte buffer")]
    LengthOutOfBounds {
        /// The declared length.
        length: usize,

        /// The actual size of the buffer.
        capacity: usize,
    },

    /// Memory for an owned copy could not be reserved.
    #[error("cannot allocate {length} bytes")]
    Allocation {
        /// The number of bytes requested.
        length: usize,

        /// The allocator failure.
        #[source]
        source: TryReserveError,
    },

    /// A foreign buffer did not contain valid UTF-8.
    #[error("buffer is not valid UTF-8")]
    InvalidUtf8 {
        /// The decoding failure.
        #[source]
        source: Utf8Error,
    },
}

/// A specialized `Result` type for fallible setup and I/O operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Extracts the usage error from a result that is expected to hold one.
#[cfg(test)]
pub(crate) fn expect_usage_error<T: std::fmt::Debug>(result: Result<T>) -> UsageError {
    match result.expect_err("operation should have been rejected") {
        Error::Usage(usage) => usage,
        other => panic!("expected a usage error, got: {other}"),
    }
}
