// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical timestamps.

use core::fmt;
use core::ops::Add;

/// A logical clock tick.
///
/// `Time` has nothing to do with wall-clock time: it is a strictly increasing counter that a
/// `Context` advances once per completed write batch. Entries, reducer inputs, and the
/// persistence arena all stamp values with the `Time` at which they were last written so that
/// "has this changed since I last looked" can be answered by a single integer comparison.
///
/// `Time::ZERO` is the sentinel used for "never written" — no real write batch is ever committed
/// at tick zero, so comparisons against it are unambiguous.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Time(u64);

impl Time {
    /// The sentinel meaning "never written".
    pub const ZERO: Self = Self(0);

    /// Constructs a `Time` from a raw tick count.
    #[must_use]
    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Returns the raw tick count.
    #[must_use]
    #[inline]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns the next tick.
    ///
    /// # Panics
    ///
    /// Panics on overflow of the underlying `u64`, which would require more write batches than any
    /// real process could issue.
    #[must_use]
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Add<u64> for Time {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u64) -> Self {
        Self(self.0 + rhs)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_less_than_any_real_tick() {
        assert!(Time::ZERO < Time::from_ticks(1).next());
    }

    #[test]
    fn next_strictly_increases() {
        let t = Time::from_ticks(41);
        assert_eq!(t.next(), Time::from_ticks(42));
        assert!(t < t.next());
    }
}
