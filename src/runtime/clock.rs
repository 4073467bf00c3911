//! Clock source
//!
//! All wake-up times are absolute tick counts on a single clock. Zero is
//! reserved for "no pending wake", so every clock here starts at 1.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Clock resolution.
pub const TICKS_PER_SEC: u64 = 1000;

/// Absolute clock value in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct ClockValue(pub u64);

impl ClockValue {
    /// The reserved "no pending wake" value.
    pub const ZERO: ClockValue = ClockValue(0);

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self + ticks`, never zero.
    #[inline]
    pub fn after(
        &self,
        ticks: u64,
    ) -> ClockValue {
        ClockValue(self.0.saturating_add(ticks).max(1))
    }

    /// Ticks from `self` until `later`, zero if `later` is not in the future.
    #[inline]
    pub fn ticks_until(
        &self,
        later: ClockValue,
    ) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for ClockValue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Convert a tick count to wall-clock time.
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks.saturating_mul(1000) / TICKS_PER_SEC)
}

/// Monotonic tick source.
pub trait Clock: fmt::Debug {
    fn now(&self) -> ClockValue;
}

/// Wall-clock backed clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> ClockValue {
        let elapsed = self.start.elapsed().as_millis() as u64;
        ClockValue(elapsed.saturating_mul(TICKS_PER_SEC) / 1000 + 1)
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the scheduler.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Start at tick 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(tick: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(tick.max(1))),
        }
    }

    pub fn advance(
        &self,
        ticks: u64,
    ) {
        self.now.set(self.now.get().saturating_add(ticks));
    }

    pub fn set(
        &self,
        tick: u64,
    ) {
        self.now.set(tick.max(1));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> ClockValue {
        ClockValue(self.now.get())
    }
}
