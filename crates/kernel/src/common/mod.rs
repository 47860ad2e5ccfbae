//! Common types used throughout the simulation kernel.
//!
//! This module provides fundamental building blocks that are shared across all
//! components of the kernel. It includes:
//! 1. **Identifier Types:** Strong types for element ids, port indices, and type GUIDs.
//! 2. **Time:** The simulated clock value type with delay arithmetic.
//! 3. **Error Handling:** The recoverable kernel error taxonomy.

/// Element, port, and type identifier definitions.
pub mod id;

/// Simulated time value type.
pub mod time;

/// Recoverable error definitions.
pub mod error;

pub use error::KernelError;
pub use id::{ElementId, Guid, IdAllocator, PortIndex};
pub use time::SimTime;
