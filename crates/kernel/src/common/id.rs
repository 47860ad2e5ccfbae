//! Element and port identifier types.
//!
//! This module defines strong types for the identifiers used throughout the
//! kernel to prevent accidental mixing of id spaces. It provides the following:
//! 1. **Type Safety:** Distinguishes element ids, port indices, and type GUIDs at compile time.
//! 2. **Allocation:** A monotonic allocator for registry-assigned element ids.
//! 3. **Protocol Integration:** All id types serialize as their raw representation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of a live element instance.
///
/// Element ids are assigned by the component registry's allocator and are
/// never reused within one kernel lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

/// Index of an input or output port on an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortIndex(pub usize);

/// Stable identifier of a component type, used for registry lookup and
/// serialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(pub String);

impl ElementId {
    /// Creates a new element id from a raw 64-bit value.
    ///
    /// # Arguments
    ///
    /// * `id` - The raw 64-bit id value.
    ///
    /// # Returns
    ///
    /// A new `ElementId` wrapping the provided value.
    #[inline(always)]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw 64-bit id value.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }
}

impl PortIndex {
    /// Creates a new port index from a raw value.
    #[inline(always)]
    pub const fn new(port: usize) -> Self {
        Self(port)
    }

    /// Returns the raw port index value.
    #[inline(always)]
    pub const fn val(self) -> usize {
        self.0
    }
}

impl Guid {
    /// Creates a type GUID from any string-like value.
    pub fn new(guid: impl Into<String>) -> Self {
        Self(guid.into())
    }

    /// Returns the GUID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for PortIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic allocator for element ids.
///
/// Owned by the component registry; `reserve` lets external actors propose
/// explicit ids (e.g. during deserialization scripts) while keeping the
/// counter ahead of every id ever handed out.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Creates an allocator whose first assigned id is 1.
    ///
    /// Id 0 is reserved for the controller acting as the root parent.
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns a fresh, never-before-assigned element id.
    pub const fn allocate(&mut self) -> ElementId {
        let id = ElementId(self.next);
        self.next += 1;
        id
    }

    /// Marks an externally proposed id as used, keeping the counter ahead
    /// of it. Uniqueness against live elements is checked by the circuit.
    pub const fn reserve(&mut self, id: ElementId) {
        if id.0 >= self.next {
            self.next = id.0 + 1;
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
