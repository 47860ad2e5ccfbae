//! Component tree serialization and reconstruction.
//!
//! Serialization walks the owned component tree through each element's
//! child list, producing a metadata tree with inlined outgoing connection
//! lists. Deserialization assigns fresh ids, rebuilds compound bank
//! mappings through an old-to-new id translation, and only reconnects
//! edges whose target survived the round trip.
//!
//! Banks are an implementation detail of compounds: they are skipped on
//! the way out (their mappings are folded into the compound's node) and
//! recreated by the compound factory on the way in.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::warn;

use crate::circuit::Circuit;
use crate::common::{ElementId, Guid, KernelError, PortIndex};
use crate::core::Core;
use crate::element::{Metadata, PortRef};
use crate::library::{BANK_GUID, ComponentLibrary};

/// Keys in a compound's serialized metadata holding bank mappings.
const COMPOUND_INPUTS_KEY: &str = "compound-inputs";
/// See [`COMPOUND_INPUTS_KEY`].
const COMPOUND_OUTPUTS_KEY: &str = "compound-outputs";

/// One serialized element.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Node {
    #[serde(rename = "GUID")]
    guid: String,
    id: u64,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    connections: Vec<(usize, u64, usize, u64)>,
    #[serde(default)]
    children: Vec<Node>,
}

/// Serializes the given subtrees (or the whole root forest).
///
/// Listed ids that are descendants of other listed ids are skipped so no
/// element appears twice.
///
/// # Errors
///
/// Returns [`KernelError::UnknownElement`] for a listed id that is not live.
pub fn serialize(circuit: &Circuit, ids: Option<&[ElementId]>) -> Result<Value, KernelError> {
    let targets: Vec<ElementId> = match ids {
        Some(listed) => {
            for id in listed {
                if !circuit.contains(*id) {
                    return Err(KernelError::UnknownElement { id: *id });
                }
            }
            listed
                .iter()
                .copied()
                .filter(|id| !has_listed_ancestor(circuit, *id, listed))
                .collect()
        }
        None => circuit.roots().to_vec(),
    };

    let mut nodes = Vec::with_capacity(targets.len());
    for id in &targets {
        let node = node_for(circuit, *id)?;
        nodes.push(serde_json::to_value(node)?);
    }
    Ok(Value::Array(nodes))
}

fn has_listed_ancestor(circuit: &Circuit, id: ElementId, listed: &[ElementId]) -> bool {
    let mut cursor = id;
    while let Ok(element) = circuit.get(cursor) {
        let parent = element.parent();
        if parent == cursor || !circuit.contains(parent) {
            return false;
        }
        if listed.contains(&parent) {
            return true;
        }
        cursor = parent;
    }
    false
}

fn node_for(circuit: &Circuit, id: ElementId) -> Result<Node, KernelError> {
    let element = circuit.get(id)?;
    let mut metadata = element.describe();

    // Fold bank mappings into the compound's own node.
    if let Some(compound) = element.as_compound() {
        let _ = metadata.insert(
            COMPOUND_INPUTS_KEY.into(),
            bank_entries(circuit, compound.input_bank())?,
        );
        let _ = metadata.insert(
            COMPOUND_OUTPUTS_KEY.into(),
            bank_entries(circuit, compound.output_bank())?,
        );
    }

    let connections = circuit
        .outgoing(id)
        .into_iter()
        .map(|(port, link)| (port.val(), link.sink.val(), link.sink_port.val(), link.delay))
        .collect();

    let children = element
        .children()
        .iter()
        .filter(|child| {
            circuit
                .get(**child)
                .is_ok_and(|c| c.guid().as_str() != BANK_GUID)
        })
        .map(|child| node_for(circuit, *child))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Node {
        guid: element.guid().as_str().to_owned(),
        id: id.val(),
        metadata,
        connections,
        children,
    })
}

fn bank_entries(circuit: &Circuit, bank_id: ElementId) -> Result<Value, KernelError> {
    let bank = circuit
        .get(bank_id)?
        .as_bank()
        .ok_or(KernelError::UnknownElement { id: bank_id })?;
    let entries: Vec<Value> = bank
        .entries()
        .map(|(port, target)| json!([port.val(), target.element.val(), target.port.val()]))
        .collect();
    Ok(Value::Array(entries))
}

/// Reconstructs elements from a serialization payload.
///
/// Returns the fresh ids of the reconstructed top-level elements.
///
/// # Errors
///
/// Fails on malformed payloads or unknown GUIDs; successfully created
/// elements up to that point remain (commands are not transactional).
pub fn deserialize(
    circuit: &mut Circuit,
    library: &mut ComponentLibrary,
    core: &mut Core,
    data: &Value,
) -> Result<Vec<ElementId>, KernelError> {
    let nodes: Vec<Node> = serde_json::from_value(data.clone())?;

    let mut translation: HashMap<u64, ElementId> = HashMap::new();
    let mut top_level = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let id = create_node(circuit, library, node, crate::circuit::ROOT, &mut translation)?;
        top_level.push(id);
    }

    for node in &nodes {
        reconnect(circuit, core, node, &translation)?;
    }
    Ok(top_level)
}

fn create_node(
    circuit: &mut Circuit,
    library: &mut ComponentLibrary,
    node: &Node,
    parent: ElementId,
    translation: &mut HashMap<u64, ElementId>,
) -> Result<ElementId, KernelError> {
    // Mapping keys reference old ids; they are re-applied after the
    // children exist under their fresh ids.
    let mut metadata = node.metadata.clone();
    let _ = metadata.remove(COMPOUND_INPUTS_KEY);
    let _ = metadata.remove(COMPOUND_OUTPUTS_KEY);
    let _ = metadata.remove("id");

    let guid = Guid::new(node.guid.clone());
    let elements = library.instantiate(&guid, None, parent, &metadata)?;
    let principal = elements
        .first()
        .map(|e| e.id())
        .ok_or_else(|| KernelError::MalformedCommand {
            reason: format!("factory for {guid} produced no elements"),
        })?;
    circuit.insert(elements)?;
    let _ = translation.insert(node.id, principal);

    for child in &node.children {
        let _ = create_node(circuit, library, child, principal, translation)?;
    }

    apply_bank_mappings(circuit, node, principal, translation)?;
    Ok(principal)
}

fn apply_bank_mappings(
    circuit: &mut Circuit,
    node: &Node,
    compound: ElementId,
    translation: &HashMap<u64, ElementId>,
) -> Result<(), KernelError> {
    for (key, input_side) in [(COMPOUND_INPUTS_KEY, true), (COMPOUND_OUTPUTS_KEY, false)] {
        let Some(entries) = node.metadata.get(key) else {
            continue;
        };
        let entries: Vec<(usize, u64, usize)> = serde_json::from_value(entries.clone())?;
        for (port, inner_old, inner_port) in entries {
            let Some(inner) = translation.get(&inner_old) else {
                warn!(inner_old, "bank mapping target did not survive the round trip");
                continue;
            };
            let target = PortRef::new(*inner, PortIndex::new(inner_port));
            if input_side {
                circuit.map_compound_input(compound, PortIndex::new(port), target)?;
            } else {
                circuit.map_compound_output(compound, PortIndex::new(port), target)?;
            }
        }
    }
    Ok(())
}

fn reconnect(
    circuit: &mut Circuit,
    core: &mut Core,
    node: &Node,
    translation: &HashMap<u64, ElementId>,
) -> Result<(), KernelError> {
    if let Some(source) = translation.get(&node.id) {
        for (source_port, sink_old, sink_port, delay) in &node.connections {
            // Only reconnect edges whose target survived the round trip.
            let Some(sink) = translation.get(sink_old) else {
                continue;
            };
            let result = circuit.connect(
                PortRef::new(*source, PortIndex::new(*source_port)),
                PortRef::new(*sink, PortIndex::new(*sink_port)),
                *delay,
                core.clock(),
            );
            match result {
                Ok(resync) => {
                    for event in resync {
                        core.schedule(event);
                    }
                }
                Err(error) => warn!(%error, "skipping unreconstructable connection"),
            }
        }
    }
    for child in &node.children {
        reconnect(circuit, core, child, translation)?;
    }
    Ok(())
}
