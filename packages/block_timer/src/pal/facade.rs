use std::fmt::Debug;
use std::io;
#[cfg(test)]
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use crate::pal::FakePlatform;
use crate::pal::{Platform, RealPlatform};

#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Real(RealPlatform),

    #[cfg(test)]
    Fake(Arc<FakePlatform>),
}

impl PlatformFacade {
    pub(crate) fn real() -> Self {
        Self::Real(RealPlatform::new())
    }

    #[cfg(test)]
    pub(crate) fn fake(platform: FakePlatform) -> Self {
        Self::Fake(Arc::new(platform))
    }
}

impl Platform for PlatformFacade {
    fn monotonic_time(&self) -> io::Result<Duration> {
        match self {
            Self::Real(p) => p.monotonic_time(),
            #[cfg(test)]
            Self::Fake(p) => p.monotonic_time(),
        }
    }

    fn thread_time(&self) -> io::Result<Duration> {
        match self {
            Self::Real(p) => p.thread_time(),
            #[cfg(test)]
            Self::Fake(p) => p.thread_time(),
        }
    }

    fn process_time(&self) -> io::Result<Duration> {
        match self {
            Self::Real(p) => p.process_time(),
            #[cfg(test)]
            Self::Fake(p) => p.process_time(),
        }
    }
}

impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real(p) => p.fmt(f),
            #[cfg(test)]
            Self::Fake(p) => p.fmt(f),
        }
    }
}
