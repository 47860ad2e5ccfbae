//! Command and reply message definitions.
//!
//! This module defines the sole externally observable surface of the
//! kernel. It provides:
//! 1. **Commands:** The inbound message set, each tagged by `type` and carrying a `request-id`.
//! 2. **Replies:** The outbound message set, each carrying the current `clock` and correlation ids.
//! 3. **Properties:** The get/set simulation property surface (`rate`, `clock`, `retired_events`).
//!
//! Everything crossing the kernel boundary is one of these types; no
//! element or event ever crosses it directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::element::Metadata;

/// An inbound command envelope: correlation id plus the command payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id echoed as `in-reply-to` on replies. Defaults to 0
    /// when omitted.
    #[serde(rename = "request-id", default)]
    pub request_id: u64,
    /// The command payload.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands consumed by the controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Instantiates a component from the registry.
    Create {
        /// Component type GUID.
        #[serde(rename = "GUID")]
        guid: String,
        /// Optional externally proposed element id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        /// Owning parent id; omitted means the controller root.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<u64>,
        /// Type-specific configuration overlaying the registry defaults.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },

    /// Updates an element's metadata (including compound bank mappings).
    Update {
        /// Target element.
        id: u64,
        /// Metadata to apply.
        metadata: Metadata,
    },

    /// Destroys an element and all its descendants.
    Delete {
        /// Target element.
        id: u64,
    },

    /// Connects a source output port to a sink input port.
    Connect {
        /// Driving element.
        source_id: u64,
        /// Output port on the driving element.
        source_port: usize,
        /// Receiving element.
        sink_id: u64,
        /// Input port on the receiving element.
        sink_port: usize,
        /// Propagation delay of the connection.
        #[serde(default)]
        delay: u64,
    },

    /// Removes the connection at a source output port.
    Disconnect {
        /// Driving element.
        source_id: u64,
        /// Output port on the driving element.
        source_port: usize,
    },

    /// Schedules a signal transition on an element input.
    Edge {
        /// Target element.
        id: u64,
        /// Target input port.
        input: usize,
        /// New signal value.
        state: bool,
        /// Offset from the current clock at which the edge fires.
        #[serde(default)]
        delay: u64,
    },

    /// Requests an element's observable metadata.
    Query {
        /// Target element.
        id: u64,
    },

    /// Serializes the component tree (or the listed subtrees).
    Serialize {
        /// Optional subtree roots; omitted serializes everything.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ids: Option<Vec<u64>>,
    },

    /// Reconstructs components from a serialization payload.
    Deserialize {
        /// Payload produced by a prior `serialize`.
        data: Value,
    },

    /// Executes nested commands serially inside a batch bracket.
    Batch {
        /// Nested commands; nesting another batch is forbidden.
        commands: Vec<Request>,
    },

    /// Sets writable simulation properties.
    SetSimulationProperties {
        /// Property patch; unknown or read-only keys are rejected.
        properties: PropertyPatch,
    },

    /// Requests the current simulation properties.
    QuerySimulationProperties,

    /// Requests the registry's component type listing.
    #[serde(rename = "enumerate_components")]
    EnumerateComponents,

    /// Stops the simulation loop cooperatively.
    Quit,
}

/// Writable subset of the simulation properties.
///
/// Unknown fields are rejected so attempts to set read-only properties
/// (`clock`, `retired_events`) surface as malformed commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PropertyPatch {
    /// New simulation rate in simulated time units per wall-clock second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

/// The full simulation property set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    /// Simulated time units per wall-clock second (read-write).
    pub rate: f64,
    /// Current simulated time (read-only).
    pub clock: u64,
    /// Processed-event counter (read-only, monotonically increasing).
    pub retired_events: u64,
}

/// An outbound reply/notification envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    /// Simulated clock at posting time.
    pub clock: u64,
    /// Correlation id of the command this replies to, if any.
    #[serde(
        rename = "in-reply-to",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub in_reply_to: Option<u64>,
    /// Enclosing batch's correlation id, if inside a batch.
    #[serde(rename = "batch-id", default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<u64>,
    /// The reply payload.
    #[serde(flatten)]
    pub report: Report,
}

/// Replies and notifications posted by the controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Report {
    /// Liveness signal emitted once per scheduling window.
    Alive,

    /// State or connectivity change notification.
    Change {
        /// Re-derived observable metadata of the affected element.
        data: Value,
    },

    /// A command failed; kernel state remains consistent.
    Error {
        /// Human-readable failure description.
        message: String,
        /// Debug rendering of the underlying error.
        exception: String,
    },

    /// Current simulation properties.
    SimulationProperties {
        /// The property set.
        properties: Properties,
    },

    /// Serialization payload.
    Serialization {
        /// The serialized component tree.
        data: Value,
    },

    /// Marks the beginning of a deserialization.
    DeserializationStart,

    /// Marks the end of a deserialization.
    DeserializationEnd {
        /// Ids of the reconstructed top-level elements.
        ids: Vec<u64>,
    },

    /// Registry component type listing.
    #[serde(rename = "enumerate_components")]
    EnumerateComponents {
        /// `[GUID, metadata defaults]` pairs.
        data: Value,
    },

    /// Marks the beginning of a batch bracket.
    BatchStart,

    /// Marks the end of a batch bracket.
    BatchEnd,
}
