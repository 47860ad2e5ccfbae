//! Zero-delay indirection table element.
//!
//! An `InputOutputBank` maps a composite's boundary ports to inner
//! element/port pairs. Banks never receive events themselves: the circuit
//! resolves edge delivery and connection requests through bank mappings
//! before they reach a concrete element, so the indirection adds no delay.

use serde_json::{Value, json};

use crate::common::{ElementId, Guid, PortIndex, SimTime};
use crate::event::Scheduled;

use super::{Element, InputLink, Metadata, OutputLink, PortRef};

/// Mapping table routing a composite's boundary ports to inner elements.
#[derive(Debug)]
pub struct InputOutputBank {
    id: ElementId,
    guid: Guid,
    parent: ElementId,
    mapping: Vec<Option<PortRef>>,
}

impl InputOutputBank {
    /// Creates an empty bank owned by `parent`.
    pub const fn new(id: ElementId, parent: ElementId, guid: Guid) -> Self {
        Self {
            id,
            guid,
            parent,
            mapping: Vec::new(),
        }
    }

    /// Returns the inner endpoint mapped at `port`, if any.
    pub fn lookup(&self, port: PortIndex) -> Option<PortRef> {
        self.mapping.get(port.val()).copied().flatten()
    }

    /// Maps `port` to an inner endpoint, extending the table as needed.
    pub fn map(&mut self, port: PortIndex, target: PortRef) {
        if port.val() >= self.mapping.len() {
            self.mapping.resize(port.val() + 1, None);
        }
        self.mapping[port.val()] = Some(target);
    }

    /// Clears the mapping at `port`.
    pub fn unmap(&mut self, port: PortIndex) {
        if let Some(slot) = self.mapping.get_mut(port.val()) {
            *slot = None;
        }
    }

    /// Returns `(port, target)` for every mapped port.
    pub fn entries(&self) -> impl Iterator<Item = (PortIndex, PortRef)> + '_ {
        self.mapping
            .iter()
            .enumerate()
            .filter_map(|(port, target)| target.map(|t| (PortIndex::new(port), t)))
    }
}

impl Element for InputOutputBank {
    fn id(&self) -> ElementId {
        self.id
    }

    fn guid(&self) -> &Guid {
        &self.guid
    }

    fn parent(&self) -> ElementId {
        self.parent
    }

    fn describe(&self) -> Metadata {
        let mut meta = Metadata::new();
        let _ = meta.insert("id".into(), json!(self.id.val()));
        let _ = meta.insert("GUID".into(), Value::String(self.guid.as_str().into()));
        let mapping: Vec<Value> = self
            .entries()
            .map(|(port, t)| json!([port.val(), t.element.val(), t.port.val()]))
            .collect();
        let _ = meta.insert("mapping".into(), Value::Array(mapping));
        meta
    }

    fn merge_metadata(&mut self, _metadata: &Metadata) {}

    fn edge(&mut self, _input: PortIndex, _state: bool) {
        debug_assert!(false, "banks are resolved before delivery");
    }

    fn clock(&mut self, _when: SimTime) -> Vec<Scheduled> {
        Vec::new()
    }

    fn input_count(&self) -> usize {
        self.mapping.len()
    }

    fn input_link(&self, _input: PortIndex) -> Option<InputLink> {
        None
    }

    fn output_count(&self) -> usize {
        self.mapping.len()
    }

    fn output_link(&self, _output: PortIndex) -> Option<OutputLink> {
        None
    }

    fn can_drive(&self, _output: PortIndex) -> bool {
        false
    }

    fn connect(&mut self, _output: PortIndex, _link: OutputLink) -> bool {
        false
    }

    fn disconnect(&mut self, _output: PortIndex) -> Option<OutputLink> {
        None
    }

    fn connected(&mut self, _source: ElementId, _source_port: PortIndex, _input: PortIndex) -> bool {
        false
    }

    fn disconnected(&mut self, _input: PortIndex) -> bool {
        false
    }

    fn as_bank(&self) -> Option<&InputOutputBank> {
        Some(self)
    }

    fn as_bank_mut(&mut self) -> Option<&mut InputOutputBank> {
        Some(self)
    }
}
