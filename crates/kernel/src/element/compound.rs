//! Hierarchical composite element.
//!
//! A `CompoundElement` never stores its own inputs or outputs. Two internal
//! [`InputOutputBank`](super::InputOutputBank) children act as zero-delay
//! indirection tables: external edges and clocks route through the input
//! bank, external connections through the output bank. The circuit resolves
//! both before any propagation logic runs, so hierarchical composition does
//! not special-case the kernel anywhere else.

use serde_json::{Value, json};

use crate::common::{ElementId, Guid, PortIndex, SimTime};
use crate::event::Scheduled;

use super::{Element, InputLink, Metadata, OutputLink};

/// Hierarchical composite built from two internal indirection banks.
#[derive(Debug)]
pub struct CompoundElement {
    id: ElementId,
    guid: Guid,
    parent: ElementId,
    input_bank: ElementId,
    output_bank: ElementId,
    children: Vec<ElementId>,
    side: Metadata,
}

impl CompoundElement {
    /// Creates a composite shell referencing its two bank children.
    ///
    /// The banks themselves are separate arena elements created by the
    /// component factory alongside this shell.
    pub fn new(
        id: ElementId,
        parent: ElementId,
        guid: Guid,
        input_bank: ElementId,
        output_bank: ElementId,
    ) -> Self {
        Self {
            id,
            guid,
            parent,
            input_bank,
            output_bank,
            children: vec![input_bank, output_bank],
            side: Metadata::new(),
        }
    }

    /// Returns the bank resolving external input edges and clocks.
    pub const fn input_bank(&self) -> ElementId {
        self.input_bank
    }

    /// Returns the bank resolving external connections.
    pub const fn output_bank(&self) -> ElementId {
        self.output_bank
    }
}

impl Element for CompoundElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn guid(&self) -> &Guid {
        &self.guid
    }

    fn parent(&self) -> ElementId {
        self.parent
    }

    fn children(&self) -> &[ElementId] {
        &self.children
    }

    fn attach_child(&mut self, child: ElementId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    fn detach_child(&mut self, child: ElementId) {
        self.children.retain(|c| *c != child);
    }

    fn describe(&self) -> Metadata {
        let mut meta = self.side.clone();
        let _ = meta.insert("id".into(), json!(self.id.val()));
        let _ = meta.insert("GUID".into(), Value::String(self.guid.as_str().into()));
        let children: Vec<Value> = self.children.iter().map(|c| json!(c.val())).collect();
        let _ = meta.insert("children".into(), Value::Array(children));
        meta
    }

    fn merge_metadata(&mut self, metadata: &Metadata) {
        for (key, value) in metadata {
            let _ = self.side.insert(key.clone(), value.clone());
        }
    }

    fn edge(&mut self, _input: PortIndex, _state: bool) {
        debug_assert!(false, "compound edges are resolved through the input bank");
    }

    fn clock(&mut self, _when: SimTime) -> Vec<Scheduled> {
        Vec::new()
    }

    fn input_count(&self) -> usize {
        0
    }

    fn input_link(&self, _input: PortIndex) -> Option<InputLink> {
        None
    }

    fn output_count(&self) -> usize {
        0
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

    fn as_compound(&self) -> Option<&CompoundElement> {
        Some(self)
    }

    fn as_compound_mut(&mut self) -> Option<&mut CompoundElement> {
        Some(self)
    }
}
