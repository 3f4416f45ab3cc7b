use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Integer-nanosecond control-cycle clock.
///
/// The tick timestamp handed to the controller each cycle. Tracking
/// elapsed time as a monotonically increasing `u64` nanosecond count
/// avoids floating-point accumulation drift over long sessions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct CtrlTime {
    nanos: u64,
}

impl CtrlTime {
    /// A `CtrlTime` at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { nanos: 0 }
    }

    /// Create a `CtrlTime` from a raw nanosecond count.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Create a `CtrlTime` from seconds (as `f64`).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_secs(secs: f64) -> Self {
        Self {
            nanos: (secs * 1_000_000_000.0) as u64,
        }
    }

    /// Raw nanosecond count.
    #[must_use]
    pub const fn nanos(&self) -> u64 {
        self.nanos
    }

    /// Elapsed seconds as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Advance the clock by `delta_nanos` nanoseconds.
    pub fn advance(&mut self, delta_nanos: u64) {
        self.nanos = self.nanos.saturating_add(delta_nanos);
    }

    /// Advance the clock by `delta_secs` seconds.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn advance_secs(&mut self, delta_secs: f64) {
        self.advance((delta_secs * 1_000_000_000.0) as u64);
    }

    /// Time elapsed since `earlier`. Returns zero if `earlier` is ahead.
    #[must_use]
    pub const fn elapsed_since(&self, earlier: Self) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }
}

impl Add<Duration> for CtrlTime {
    type Output = Self;

    #[allow(clippy::cast_possible_truncation)]
    fn add(self, rhs: Duration) -> Self {
        Self {
            nanos: self.nanos.saturating_add(rhs.as_nanos() as u64),
        }
    }
}

impl AddAssign<Duration> for CtrlTime {
    #[allow(clippy::cast_possible_truncation)]
    fn add_assign(&mut self, rhs: Duration) {
        self.nanos = self.nanos.saturating_add(rhs.as_nanos() as u64);
    }
}

impl Sub for CtrlTime {
    type Output = Duration;

    /// Saturating difference between two time points.
    fn sub(self, rhs: Self) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(rhs.nanos))
    }
}

impl fmt::Display for CtrlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.nanos / 1_000_000_000;
        let micros = (self.nanos % 1_000_000_000) / 1_000;
        write!(f, "{secs}.{micros:06}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrltime_new_is_zero() {
        assert_eq!(CtrlTime::new().nanos(), 0);
    }

    #[test]
    fn ctrltime_from_secs() {
        let t = CtrlTime::from_secs(2.5);
        assert_eq!(t.nanos(), 2_500_000_000);
        assert!((t.secs_f64() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn ctrltime_advance() {
        let mut t = CtrlTime::new();
        t.advance_secs(0.01);
        t.advance_secs(0.01);
        assert_eq!(t.nanos(), 20_000_000);
    }

    #[test]
    fn ctrltime_sub_saturates() {
        let a = CtrlTime::from_secs(1.0);
        let b = CtrlTime::from_secs(3.0);
        assert_eq!(a - b, Duration::ZERO);
        assert_eq!(b - a, Duration::from_secs(2));
    }

    #[test]
    fn ctrltime_elapsed_since() {
        let a = CtrlTime::from_secs(5.0);
        let b = CtrlTime::from_secs(2.0);
        assert_eq!(a.elapsed_since(b), Duration::from_secs(3));
        assert_eq!(b.elapsed_since(a), Duration::ZERO);
    }

    #[test]
    fn ctrltime_display() {
        let t = CtrlTime::from_nanos(1_234_567_890);
        assert_eq!(format!("{t}"), "1.234567s");
    }

    #[test]
    fn ctrltime_ordering() {
        assert!(CtrlTime::from_secs(1.0) < CtrlTime::from_secs(2.0));
    }
}
