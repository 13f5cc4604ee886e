//! Wall clock collaborator: seconds since 2000-01-01 UTC, with
//! retrograde/nonsensical detection.

use std::sync::atomic::{AtomicI64, Ordering};

use thiserror::Error;

/// Errors the clock collaborator can report.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The clock reported a time before the epoch, or earlier than the
    /// last successful reading — neither is trustworthy for expiration
    /// math, so callers must fall back to the unreliable-time sentinel.
    #[error("clock is unreliable (before epoch-2000 or retrograde)")]
    Unreliable,
}

/// A source of wall-clock time, seconds since 2000-01-01 UTC.
pub trait Clock {
    /// Reads the current time. Returns [`Error::Unreliable`] if the clock
    /// is before epoch-2000 or has gone backwards since the last call.
    fn systime(&self) -> Result<u64, Error>;
}

/// The real OS wall clock, with retrograde detection across calls.
pub struct SystemClock {
    last_seen: AtomicI64,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            last_seen: AtomicI64::new(-1),
        }
    }
}

impl Clock for SystemClock {
    fn systime(&self) -> Result<u64, Error> {
        let now = time::OffsetDateTime::now_utc();
        let secs_since_2000 = (now - bpv6::EPOCH_2000).whole_seconds();
        if secs_since_2000 < 0 {
            return Err(Error::Unreliable);
        }

        let prev = self.last_seen.load(Ordering::Acquire);
        if prev >= 0 && secs_since_2000 < prev {
            return Err(Error::Unreliable);
        }
        self.last_seen.store(secs_since_2000, Ordering::Release);
        Ok(secs_since_2000 as u64)
    }
}

/// A clock driven entirely by the caller, for deterministic tests of the
/// send/receive paths' time-reliability handling.
#[derive(Default)]
pub struct FixedClock {
    value: AtomicI64,
    unreliable: std::sync::atomic::AtomicBool,
}

impl FixedClock {
    /// A clock that will always report `seconds`.
    pub fn new(seconds: u64) -> Self {
        Self {
            value: AtomicI64::new(seconds as i64),
            unreliable: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Advances the reported time.
    pub fn set(&self, seconds: u64) {
        self.value.store(seconds as i64, Ordering::Release);
    }

    /// Forces the next (and only the next) `systime` call to report
    /// [`Error::Unreliable`].
    pub fn force_unreliable_once(&self) {
        self.unreliable.store(true, Ordering::Release);
    }
}

impl Clock for FixedClock {
    fn systime(&self) -> Result<u64, Error> {
        if self.unreliable.swap(false, Ordering::AcqRel) {
            return Err(Error::Unreliable);
        }
        Ok(self.value.load(Ordering::Acquire) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_forced_value() {
        let clock = FixedClock::new(42);
        assert_eq!(clock.systime().unwrap(), 42);
    }

    #[test]
    fn fixed_clock_unreliable_fires_once() {
        let clock = FixedClock::new(42);
        clock.force_unreliable_once();
        assert!(clock.systime().is_err());
        assert_eq!(clock.systime().unwrap(), 42);
    }

    #[test]
    fn system_clock_detects_retrograde() {
        let clock = SystemClock::default();
        let first = clock.systime().unwrap();
        clock.last_seen.store((first + 1000) as i64, Ordering::Release);
        assert!(clock.systime().is_err());
    }
}
