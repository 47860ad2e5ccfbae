//! Element contract and concrete element kinds.
//!
//! This module defines the `Element` trait implemented by every simulated
//! component. It provides:
//! 1. **Identification:** `id`, `guid`, `parent`, and `children` for tree walking.
//! 2. **Propagation:** `edge` (immediate input mutation) and `clock` (per-timestamp tick).
//! 3. **Connection Protocol:** Boolean two-phase connect/disconnect with sink acceptance hooks.
//! 4. **Observability:** `describe` re-derives the open metadata map from live state.
//! 5. **Downcasting:** Optional casts to the concrete kinds for kind-specific access.
//!
//! All implementors must be `Send` so a kernel (circuit included) can be
//! moved onto its worker thread. Elements are never shared across threads.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{ElementId, Guid, PortIndex, SimTime};
use crate::event::Scheduled;

/// Generic combinational gate element.
pub mod simple;

/// Fan-out signal distributor element.
pub mod interconnect;

/// Zero-delay indirection table element.
pub mod bank;

/// Hierarchical composite element.
pub mod compound;

pub use bank::InputOutputBank;
pub use compound::CompoundElement;
pub use interconnect::Interconnect;
pub use simple::{LogicKind, SimpleElement};

/// Open key-value metadata map attached to every element.
///
/// The kernel keeps typed state for everything it interprets; this map is
/// the pass-through/display side table plus the derived observable view.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// An element/port pair, the endpoint of a connection or indirection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRef {
    /// Referenced element.
    pub element: ElementId,
    /// Port on the referenced element.
    pub port: PortIndex,
}

impl PortRef {
    /// Creates a port reference.
    pub const fn new(element: ElementId, port: PortIndex) -> Self {
        Self { element, port }
    }
}

/// An upstream connection recorded on an input port.
///
/// An input port accepts at most one upstream connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputLink {
    /// Driving element.
    pub source: ElementId,
    /// Output port on the driving element.
    pub source_port: PortIndex,
}

/// A downstream connection recorded on an output port, with its
/// per-connection propagation delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLink {
    /// Receiving element.
    pub sink: ElementId,
    /// Input port on the receiving element.
    pub sink_port: PortIndex,
    /// Propagation delay of this connection, in simulated time units.
    pub delay: u64,
}

/// Contract implemented by every simulated component.
///
/// The connection protocol is two-phase: the circuit checks the source's
/// capacity (`can_drive`), runs the sink's acceptance hook (`connected`),
/// and only then commits the source side (`connect`). Rejection is a
/// boolean outcome the caller must check, not an error.
pub trait Element: Send + fmt::Debug {
    /// Returns this element's unique id.
    fn id(&self) -> ElementId;

    /// Returns the component type GUID this element was built from.
    fn guid(&self) -> &Guid;

    /// Returns the owning parent (a compound element, or the controller
    /// root id for top-level elements).
    fn parent(&self) -> ElementId;

    /// Returns the owned child element ids, innermost ownership only.
    fn children(&self) -> &[ElementId] {
        &[]
    }

    /// Records a new child. Only composites own children.
    fn attach_child(&mut self, _child: ElementId) {}

    /// Forgets a child. Only composites own children.
    fn detach_child(&mut self, _child: ElementId) {}

    /// Re-derives the observable metadata map from live state.
    ///
    /// Always contains at least `id` and `GUID`.
    fn describe(&self) -> Metadata;

    /// Merges pass-through metadata not interpreted by the kernel.
    fn merge_metadata(&mut self, metadata: &Metadata);

    /// Applies a state change to an input port.
    ///
    /// Takes effect immediately and produces no further events by itself.
    fn edge(&mut self, input: PortIndex, state: bool);

    /// Tick callback, fired once all edges at `when` have been applied.
    ///
    /// Returns the follow-up events to schedule.
    fn clock(&mut self, when: SimTime) -> Vec<Scheduled>;

    /// Returns the number of input ports currently addressable.
    fn input_count(&self) -> usize;

    /// Returns the upstream connection at `input`, if any.
    fn input_link(&self, input: PortIndex) -> Option<InputLink>;

    /// Returns the number of output ports currently addressable.
    fn output_count(&self) -> usize;

    /// Returns the downstream connection at `output`, if any.
    fn output_link(&self, output: PortIndex) -> Option<OutputLink>;

    /// Returns whether `output` can accept a new connection.
    ///
    /// An occupied output port refuses until explicitly disconnected.
    fn can_drive(&self, output: PortIndex) -> bool;

    /// Commits a downstream connection on `output`.
    ///
    /// Returns `false` if the port is occupied or unavailable; the circuit
    /// rolls back the sink side in that case.
    fn connect(&mut self, output: PortIndex, link: OutputLink) -> bool;

    /// Removes the downstream connection at `output`.
    ///
    /// Returns the removed link so the circuit can release the peer's
    /// input port; `None` means nothing was connected (a no-op).
    fn disconnect(&mut self, output: PortIndex) -> Option<OutputLink>;

    /// Sink-side acceptance hook of the two-phase handshake.
    ///
    /// Returns `false` to refuse (e.g. the input port is occupied); the
    /// connection is only recorded if the sink accepts.
    fn connected(&mut self, source: ElementId, source_port: PortIndex, input: PortIndex) -> bool;

    /// Releases the upstream connection at `input`.
    ///
    /// Returns `false` if nothing was connected.
    fn disconnected(&mut self, input: PortIndex) -> bool;

    /// Returns this element as a `SimpleElement` if it is one.
    fn as_simple_mut(&mut self) -> Option<&mut SimpleElement> {
        None
    }

    /// Returns this element as an `Interconnect` if it is one.
    fn as_interconnect(&self) -> Option<&Interconnect> {
        None
    }

    /// Returns this element as a mutable `Interconnect` if it is one.
    fn as_interconnect_mut(&mut self) -> Option<&mut Interconnect> {
        None
    }

    /// Returns this element as an `InputOutputBank` if it is one.
    fn as_bank(&self) -> Option<&InputOutputBank> {
        None
    }

    /// Returns this element as a mutable `InputOutputBank` if it is one.
    fn as_bank_mut(&mut self) -> Option<&mut InputOutputBank> {
        None
    }

    /// Returns this element as a `CompoundElement` if it is one.
    fn as_compound(&self) -> Option<&CompoundElement> {
        None
    }

    /// Returns this element as a mutable `CompoundElement` if it is one.
    fn as_compound_mut(&mut self) -> Option<&mut CompoundElement> {
        None
    }
}
