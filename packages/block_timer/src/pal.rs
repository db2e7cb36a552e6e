//! Platform abstraction layer for clock reads.
//!
//! This module provides a platform abstraction that allows switching between
//! the real clocks (monotonic time via the standard library, processor time via
//! the `cpu_time` package), caller-supplied event sources and fake implementations
//! for testing purposes.

mod abstractions;
mod facade;
#[cfg(test)]
mod fake;
mod real;

pub(crate) use abstractions::Platform;
pub(crate) use facade::PlatformFacade;
#[cfg(test)]
pub(crate) use fake::FakePlatform;
pub(crate) use real::RealPlatform;
