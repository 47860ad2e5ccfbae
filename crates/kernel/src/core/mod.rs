//! Simulation core: event queue, clock, and the outer loop.

/// Event scheduler and simulation loop.
pub mod scheduler;

pub use scheduler::Core;
