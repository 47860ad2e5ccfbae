//! Kernel statistics collection.
//!
//! This module tracks the counters exposed through the simulation-property
//! protocol surface. It provides:
//! 1. **Event Retirement:** Monotonic count of processed events.
//! 2. **Boundary Traffic:** Commands consumed and reports posted.
//! 3. **Wall Time:** Elapsed wall-clock time since kernel start.

use std::time::Instant;

/// Counters maintained by the core and the controller.
#[derive(Clone, Debug)]
pub struct CoreStats {
    start_time: Instant,
    /// Number of events popped and processed, monotonically increasing.
    pub retired_events: u64,
    /// Number of inbound commands consumed.
    pub commands_processed: u64,
    /// Number of replies and notifications posted outbound.
    pub reports_posted: u64,
    /// Number of uncorrelated notifications dropped because the outbound
    /// channel was full.
    pub reports_dropped: u64,
}

impl CoreStats {
    /// Creates zeroed counters anchored at the current wall time.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            retired_events: 0,
            commands_processed: 0,
            reports_posted: 0,
            reports_dropped: 0,
        }
    }

    /// Returns elapsed wall-clock seconds since kernel start.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

impl Default for CoreStats {
    fn default() -> Self {
        Self::new()
    }
}
