//! Host loop clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::constants::*;

/// Frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(transparent))]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Timer to synchronize a host thread with a fixed cycle interval.
///
/// It is designed to work with the yielding cooperative pattern
/// of the frame driver. When the machine yields control back to the
/// caller, time elapses until it is resumed. Once the driver
/// is resumed, the elapsed time is taken into account when determining
/// the next cycle.
pub struct Clock {
    interval: Duration,
    last: Instant,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Clock that cycles at the 60Hz rate of the delay and sound timers.
    pub fn timer() -> Self {
        Self::new(Duration::from_nanos(CLOCK_CYCLE_TIME))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Check without blocking whether a full cycle has elapsed.
    ///
    /// Starts the next cycle when it has.
    pub fn tick(&mut self) -> bool {
        if self.last.elapsed() >= self.interval {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        loop {
            if self.last.elapsed() < self.interval {
                // Sleep does not have enough resolution, and causes
                // the clock to run at 30 FPS.
                //
                // Yielding in a loop is the best alternative.
                thread::yield_now();
            } else {
                // Reset back to zero, rather than trying to catch up.
                //
                // If the host was paused, and a large amount of time has
                // elapsed until it is resumed, it should simply continue
                // at the next cycle running at its usual speed.
                self.reset();
                return;
            }
        }
    }
}
