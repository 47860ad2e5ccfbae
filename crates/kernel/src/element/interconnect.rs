//! Fan-out signal distributor element.
//!
//! An `Interconnect` represents the wiring between one driver and many input
//! ports. Its output list grows on demand and every endpoint carries an
//! independent propagation delay. Incoming edges only buffer the pending
//! value; the tick commits it and fans it out.
//!
//! Unchanged-state re-propagation is suppressed: a tick whose buffered value
//! equals the committed value emits nothing. The explicit [`Interconnect::reset`]
//! path is the keep-alive that re-emits the current state to every endpoint,
//! used to re-synchronize newly (re)connected subtrees.

use serde_json::{Value, json};

use crate::common::{ElementId, Guid, PortIndex, SimTime};
use crate::event::{Scheduled, SimEvent};

use super::{Element, InputLink, Metadata, OutputLink};

/// Single-driver, variable-fan-out signal distributor.
#[derive(Debug)]
pub struct Interconnect {
    id: ElementId,
    guid: Guid,
    parent: ElementId,
    state: bool,
    new_state: bool,
    input: Option<InputLink>,
    outputs: Vec<Option<OutputLink>>,
    side: Metadata,
}

impl Interconnect {
    /// Creates an interconnect with no endpoints and a low signal.
    pub fn new(id: ElementId, parent: ElementId, guid: Guid) -> Self {
        Self {
            id,
            guid,
            parent,
            state: false,
            new_state: false,
            input: None,
            outputs: Vec::new(),
            side: Metadata::new(),
        }
    }

    /// Returns the committed signal value.
    pub const fn state(&self) -> bool {
        self.state
    }

    /// Restores the committed signal value from serialized metadata.
    pub const fn restore_state(&mut self, state: bool) {
        self.state = state;
        self.new_state = state;
    }

    /// Emits one edge per endpoint carrying the current state.
    ///
    /// Does not change logical state; each edge fires at `when` plus the
    /// endpoint's own delay.
    pub fn reset(&self, when: SimTime) -> Vec<Scheduled> {
        self.endpoints()
            .map(|link| edge_to(&link, when, self.state))
            .collect()
    }

    /// Builds the re-synchronization edge for one endpoint, used right
    /// after that endpoint is connected.
    pub fn reset_endpoint(&self, link: &OutputLink, when: SimTime) -> Scheduled {
        edge_to(link, when, self.state)
    }

    fn endpoints(&self) -> impl Iterator<Item = OutputLink> + '_ {
        self.outputs.iter().copied().flatten()
    }
}

fn edge_to(link: &OutputLink, when: SimTime, state: bool) -> Scheduled {
    Scheduled::at(
        when.after(link.delay),
        SimEvent::Edge {
            element: link.sink,
            input: link.sink_port,
            state,
        },
    )
}

impl Element for Interconnect {
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
        let mut meta = self.side.clone();
        let _ = meta.insert("id".into(), json!(self.id.val()));
        let _ = meta.insert("GUID".into(), Value::String(self.guid.as_str().into()));
        let _ = meta.insert("state".into(), Value::Bool(self.state));
        let _ = meta.insert("fan-out".into(), json!(self.endpoints().count()));
        meta
    }

    fn merge_metadata(&mut self, metadata: &Metadata) {
        for (key, value) in metadata {
            let _ = self.side.insert(key.clone(), value.clone());
        }
    }

    fn edge(&mut self, input: PortIndex, state: bool) {
        // Single input port.
        debug_assert_eq!(input.val(), 0, "interconnect {} has one input", self.id);
        self.new_state = state;
    }

    fn clock(&mut self, when: SimTime) -> Vec<Scheduled> {
        if self.new_state == self.state {
            return Vec::new();
        }
        self.state = self.new_state;
        let state = self.state;
        self.endpoints()
            .map(|link| edge_to(&link, when, state))
            .collect()
    }

    fn input_count(&self) -> usize {
        1
    }

    fn input_link(&self, input: PortIndex) -> Option<InputLink> {
        if input.val() == 0 { self.input } else { None }
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn output_link(&self, output: PortIndex) -> Option<OutputLink> {
        self.outputs.get(output.val()).copied().flatten()
    }

    fn can_drive(&self, output: PortIndex) -> bool {
        // The output list auto-extends; only an occupied slot refuses.
        !matches!(self.outputs.get(output.val()), Some(Some(_)))
    }

    fn connect(&mut self, output: PortIndex, link: OutputLink) -> bool {
        if output.val() >= self.outputs.len() {
            self.outputs.resize(output.val() + 1, None);
        }
        match &mut self.outputs[output.val()] {
            slot @ None => {
                *slot = Some(link);
                true
            }
            Some(_) => false,
        }
    }

    fn disconnect(&mut self, output: PortIndex) -> Option<OutputLink> {
        // Removes a single endpoint; the list never shrinks.
        self.outputs.get_mut(output.val()).and_then(Option::take)
    }

    fn connected(&mut self, source: ElementId, source_port: PortIndex, input: PortIndex) -> bool {
        if input.val() != 0 || self.input.is_some() {
            return false;
        }
        self.input = Some(InputLink {
            source,
            source_port,
        });
        true
    }

    fn disconnected(&mut self, input: PortIndex) -> bool {
        input.val() == 0 && self.input.take().is_some()
    }

    fn as_interconnect(&self) -> Option<&Interconnect> {
        Some(self)
    }

    fn as_interconnect_mut(&mut self) -> Option<&mut Interconnect> {
        Some(self)
    }
}
