//! Simulated time
//!
//! The discrete-event scheduler that drives a simulation lives outside this
//! crate. Every operation that depends on "now" takes a [`SimTime`] from the
//! caller, and callers deliver instants in non-decreasing order.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// An instant on the simulation clock, in nanoseconds since the start of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimTime(u64);

impl SimTime {
    /// Start of the simulation
    pub const ZERO: SimTime = SimTime(0);

    /// Largest representable instant
    pub const MAX: SimTime = SimTime(u64::MAX);

    /// Create from raw nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Create from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis.saturating_mul(1_000_000))
    }

    /// Create from seconds, rounded to the nearest nanosecond.
    ///
    /// Negative and NaN inputs clamp to [`SimTime::ZERO`].
    pub fn from_secs_f64(secs: f64) -> Self {
        if !(secs > 0.0) {
            return SimTime::ZERO;
        }
        // `as` saturates on overflow
        SimTime((secs * NANOS_PER_SEC + 0.5) as u64)
    }

    /// Raw nanoseconds
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Seconds as a float
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future
    pub fn saturating_duration_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Time elapsed since `earlier`, or `None` if `earlier` is in the future
    pub fn checked_duration_since(&self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_nanos)
    }

    /// Instant `duration` after `self`, saturating at [`SimTime::MAX`]
    pub fn saturating_add(&self, duration: Duration) -> SimTime {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        SimTime(self.0.saturating_add(nanos))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}
