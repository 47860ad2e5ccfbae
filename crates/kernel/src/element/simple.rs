//! Generic combinational gate element.
//!
//! A `SimpleElement` pairs a pure logic function over its input states with
//! a fixed propagation delay. Output flips are not applied synchronously:
//! `clock` emits one `OutEdge` per changed output at `when + delay`, and the
//! output commit happens when that event is processed, keeping the cached
//! `output_states` delay-accurate.

use serde_json::{Value, json};

use crate::common::{ElementId, Guid, PortIndex, SimTime};
use crate::event::{Scheduled, SimEvent};

use super::{Element, InputLink, Metadata, OutputLink};

/// Pure combinational functions available to `SimpleElement`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicKind {
    /// Output is true when every input is true.
    And,
    /// Output is true when any input is true.
    Or,
    /// Output is true when an odd number of inputs are true.
    Xor,
    /// Negated `And`.
    Nand,
    /// Negated `Or`.
    Nor,
    /// Single-input inverter.
    Not,
}

impl LogicKind {
    /// Evaluates the function over the given input states.
    pub fn eval(self, inputs: &[bool]) -> bool {
        match self {
            Self::And => inputs.iter().all(|s| *s),
            Self::Or => inputs.iter().any(|s| *s),
            Self::Xor => inputs.iter().filter(|s| **s).count() % 2 == 1,
            Self::Nand => !inputs.iter().all(|s| *s),
            Self::Nor => !inputs.iter().any(|s| *s),
            Self::Not => !inputs.first().copied().unwrap_or(false),
        }
    }

    /// Returns the lowercase identifier used in metadata.
    pub const fn name(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Nand => "nand",
            Self::Nor => "nor",
            Self::Not => "not",
        }
    }
}

/// Generic combinational gate with a fixed propagation delay.
#[derive(Debug)]
pub struct SimpleElement {
    id: ElementId,
    guid: Guid,
    parent: ElementId,
    logic: LogicKind,
    delay: u64,
    input_states: Vec<bool>,
    output_states: Vec<bool>,
    inputs: Vec<Option<InputLink>>,
    outputs: Vec<Option<OutputLink>>,
    last_clock: Option<SimTime>,
    side: Metadata,
}

impl SimpleElement {
    /// Creates a gate with `input_count` inputs, one output, and the given
    /// logic function and propagation delay.
    pub fn new(
        id: ElementId,
        parent: ElementId,
        guid: Guid,
        logic: LogicKind,
        input_count: usize,
        delay: u64,
    ) -> Self {
        Self {
            id,
            guid,
            parent,
            logic,
            delay,
            input_states: vec![false; input_count],
            output_states: vec![false; 1],
            inputs: vec![None; input_count],
            outputs: vec![None; 1],
            last_clock: None,
            side: Metadata::new(),
        }
    }

    /// Returns the propagation delay in simulated time units.
    pub const fn delay(&self) -> u64 {
        self.delay
    }

    /// Sets the propagation delay; applies to subsequently emitted edges.
    pub const fn set_delay(&mut self, delay: u64) {
        self.delay = delay;
    }

    /// Returns the cached output state at `output`.
    pub fn output_state(&self, output: PortIndex) -> Option<bool> {
        self.output_states.get(output.val()).copied()
    }

    /// Restores cached port states, used when reconstructing an element
    /// from serialized metadata.
    pub fn restore_states(&mut self, inputs: &[bool], outputs: &[bool]) {
        for (slot, value) in self.input_states.iter_mut().zip(inputs) {
            *slot = *value;
        }
        for (slot, value) in self.output_states.iter_mut().zip(outputs) {
            *slot = *value;
        }
    }

    /// Commits an output flip, called when the corresponding `OutEdge` is
    /// processed.
    pub fn commit_output(&mut self, output: PortIndex, state: bool) {
        if let Some(slot) = self.output_states.get_mut(output.val()) {
            *slot = state;
        }
    }
}

impl Element for SimpleElement {
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
        let _ = meta.insert("logic".into(), Value::String(self.logic.name().into()));
        let _ = meta.insert("delay".into(), json!(self.delay));
        let _ = meta.insert("inputs".into(), json!(self.input_states.len()));
        let _ = meta.insert("input-states".into(), json!(self.input_states));
        let _ = meta.insert("output-states".into(), json!(self.output_states));
        meta
    }

    fn merge_metadata(&mut self, metadata: &Metadata) {
        for (key, value) in metadata {
            let _ = self.side.insert(key.clone(), value.clone());
        }
    }

    fn edge(&mut self, input: PortIndex, state: bool) {
        if let Some(slot) = self.input_states.get_mut(input.val()) {
            *slot = state;
        }
    }

    fn clock(&mut self, when: SimTime) -> Vec<Scheduled> {
        // Ticks must be strictly increasing; a repeat or a step backwards
        // means the scheduler's ordering invariant broke upstream.
        if let Some(last) = self.last_clock {
            assert!(
                when > last,
                "element {id} re-ticked at {when} (last {last})",
                id = self.id
            );
        }
        self.last_clock = Some(when);

        let result = self.logic.eval(&self.input_states);
        let fires = when.after(self.delay);
        self.output_states
            .iter()
            .enumerate()
            .filter(|(_, cached)| **cached != result)
            .map(|(port, _)| {
                Scheduled::at(
                    fires,
                    SimEvent::OutEdge {
                        element: self.id,
                        output: PortIndex::new(port),
                        state: result,
                    },
                )
            })
            .collect()
    }

    fn input_count(&self) -> usize {
        self.inputs.len()
    }

    fn input_link(&self, input: PortIndex) -> Option<InputLink> {
        self.inputs.get(input.val()).copied().flatten()
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn output_link(&self, output: PortIndex) -> Option<OutputLink> {
        self.outputs.get(output.val()).copied().flatten()
    }

    fn can_drive(&self, output: PortIndex) -> bool {
        matches!(self.outputs.get(output.val()), Some(None))
    }

    fn connect(&mut self, output: PortIndex, link: OutputLink) -> bool {
        match self.outputs.get_mut(output.val()) {
            Some(slot @ None) => {
                *slot = Some(link);
                true
            }
            _ => false,
        }
    }

    fn disconnect(&mut self, output: PortIndex) -> Option<OutputLink> {
        self.outputs.get_mut(output.val()).and_then(Option::take)
    }

    fn connected(&mut self, source: ElementId, source_port: PortIndex, input: PortIndex) -> bool {
        match self.inputs.get_mut(input.val()) {
            Some(slot @ None) => {
                *slot = Some(InputLink {
                    source,
                    source_port,
                });
                true
            }
            _ => false,
        }
    }

    fn disconnected(&mut self, input: PortIndex) -> bool {
        self.inputs
            .get_mut(input.val())
            .and_then(Option::take)
            .is_some()
    }

    fn as_simple_mut(&mut self) -> Option<&mut SimpleElement> {
        Some(self)
    }
}
