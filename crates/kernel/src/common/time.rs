//! Simulated time.
//!
//! This module defines the kernel's logical clock value type. It provides:
//! 1. **Type Safety:** Simulated timestamps cannot be mixed with wall-clock values.
//! 2. **Arithmetic:** Saturating offset addition for applying propagation delays.
//! 3. **Ordering:** Total order used by the scheduler's priority queue.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// A point on the monotonically non-decreasing simulated clock.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(pub u64);

impl SimTime {
    /// Simulated time zero, the clock value of a freshly constructed core.
    pub const ZERO: Self = Self(0);

    /// Creates a simulated timestamp from a raw tick count.
    ///
    /// # Arguments
    ///
    /// * `ticks` - The raw simulated-time value.
    ///
    /// # Returns
    ///
    /// A new `SimTime` wrapping the provided value.
    #[inline(always)]
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Returns the raw tick count.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }

    /// Returns this timestamp offset by `delay` ticks, saturating at the
    /// maximum representable time.
    #[inline]
    pub const fn after(self, delay: u64) -> Self {
        Self(self.0.saturating_add(delay))
    }
}

impl Add<u64> for SimTime {
    type Output = Self;

    fn add(self, rhs: u64) -> Self {
        self.after(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}
