//! Kernel error definitions.
//!
//! This module defines the recoverable error taxonomy for the simulation kernel. It provides:
//! 1. **Command Errors:** Failures raised while handling a single protocol command.
//! 2. **Connection Errors:** Rejections reported by the two-phase connect handshake.
//! 3. **Boundary Errors:** Channel and payload failures at the kernel boundary.
//!
//! Fatal invariant violations (scheduling into the past, re-ticking a
//! timestamp, duplicate GUID registration) are not represented here; they
//! abort the process through panics, since they indicate logic bugs rather
//! than conditions a caller can handle.

use thiserror::Error;

use super::id::{ElementId, Guid, PortIndex};

/// Recoverable kernel errors, reported to the outside world as `error`
/// replies by the controller.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A command referenced a component type GUID absent from the registry.
    #[error("unknown component type: {guid}")]
    UnknownComponentType {
        /// The GUID that failed the registry lookup.
        guid: Guid,
    },

    /// A command referenced an element id not present in the circuit.
    #[error("unknown element: {id}")]
    UnknownElement {
        /// The id that failed the arena lookup.
        id: ElementId,
    },

    /// A `create` command proposed an id that is already in use.
    #[error("element id already in use: {id}")]
    DuplicateElement {
        /// The colliding id.
        id: ElementId,
    },

    /// A connect was refused by either endpoint of the two-phase handshake.
    ///
    /// Port-occupancy rejection is an expected outcome the caller must
    /// check; no state was altered.
    #[error("connection rejected: {source_id}:{source_port} -> {sink_id}:{sink_port}")]
    ConnectionRejected {
        /// Driving element.
        source_id: ElementId,
        /// Output port on the driving element.
        source_port: PortIndex,
        /// Receiving element.
        sink_id: ElementId,
        /// Input port on the receiving element.
        sink_port: PortIndex,
    },

    /// A disconnect targeted an output port with nothing connected.
    #[error("nothing connected at {source_id}:{source_port}")]
    NotConnected {
        /// Element addressed by the disconnect.
        source_id: ElementId,
        /// Output port with no recorded connection.
        source_port: PortIndex,
    },

    /// A port index was outside the element's port range.
    #[error("port {port} out of range on {id}")]
    PortOutOfRange {
        /// Element addressed by the operation.
        id: ElementId,
        /// Offending port index.
        port: PortIndex,
    },

    /// A compound's bank indirection did not terminate at a concrete
    /// element (unmapped port or a mapping cycle).
    #[error("unresolvable indirection at {id}:{port}")]
    UnresolvedIndirection {
        /// Compound or bank where resolution stopped.
        id: ElementId,
        /// Port whose mapping could not be resolved.
        port: PortIndex,
    },

    /// A command payload did not have the expected shape.
    #[error("malformed command: {reason}")]
    MalformedCommand {
        /// Human-readable description of the malformation.
        reason: String,
    },

    /// A `batch` command appeared inside another batch.
    #[error("nested batch commands are not allowed")]
    NestedBatch,

    /// A payload failed to encode or decode at the protocol boundary.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The outbound reply channel was closed by the external actor.
    #[error("outbound channel disconnected")]
    ChannelClosed,
}
