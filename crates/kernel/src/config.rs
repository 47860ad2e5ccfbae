//! Configuration for the simulation kernel.
//!
//! This module defines the parameters that govern pacing and the kernel
//! boundary. It provides:
//! 1. **Defaults:** Baseline pacing constants (rate, scheduling interval, channel capacity).
//! 2. **Structure:** A flat config consumed by the controller at startup.
//! 3. **Overrides:** `serde::Deserialize` support for JSON-supplied configuration.

use serde::Deserialize;

/// Default configuration constants for the kernel.
///
/// These values define the baseline behavior when not explicitly overridden
/// by deserialized configuration or `set-simulation-properties` commands.
mod defaults {
    /// Default simulation rate in simulated time units per wall-clock second.
    ///
    /// At 1000 units/s a one-unit gate delay corresponds to one millisecond
    /// of wall time when the kernel keeps up.
    pub const RATE: f64 = 1_000.0;

    /// Scheduling interval in milliseconds.
    ///
    /// The controller drains its command queue and hands the core one
    /// pacing window of this length per outer-loop iteration. Shorter
    /// intervals improve command latency at the cost of loop overhead.
    pub const SCHEDULING_INTERVAL_MS: u64 = 20;

    /// Capacity of the inbound and outbound message channels.
    ///
    /// Both channels are bounded so a stalled external actor exerts
    /// backpressure instead of growing an unbounded buffer.
    pub const CHANNEL_CAPACITY: usize = 256;

    /// Whether command-handling errors abort instead of producing `error`
    /// replies. Off outside tests and diagnostics.
    pub const FAIL_FAST: bool = false;
}

/// Kernel configuration passed to the controller at startup.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Simulation rate: simulated time units per wall-clock second.
    pub rate: f64,
    /// Length of one controller scheduling window, in milliseconds.
    pub scheduling_interval_ms: u64,
    /// Bounded capacity of each boundary channel.
    pub channel_capacity: usize,
    /// Diagnostic flag: panic on command errors instead of replying.
    pub fail_fast: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate: defaults::RATE,
            scheduling_interval_ms: defaults::SCHEDULING_INTERVAL_MS,
            channel_capacity: defaults::CHANNEL_CAPACITY,
            fail_fast: defaults::FAIL_FAST,
        }
    }
}
