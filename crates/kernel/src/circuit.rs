//! Component tree arena and connection orchestration.
//!
//! This module owns every live element and mediates all operations that
//! involve more than one of them. It provides:
//! 1. **Arena:** Elements indexed by id; ownership stays flat, tree shape lives in parent/child ids.
//! 2. **Indirection:** Resolution of compound/bank boundaries down to concrete endpoints.
//! 3. **Connection Handshake:** Two-phase connect (capacity check, sink acceptance, commit).
//! 4. **Delivery:** Edge application and tick firing during event processing.
//! 5. **Teardown:** Recursive destruction, children before parents, edges before nodes.

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::common::{ElementId, KernelError, PortIndex, SimTime};
use crate::element::{Element, Interconnect, Metadata, OutputLink, PortRef};
use crate::event::{Scheduled, SimEvent};

/// Id of the controller acting as root parent of top-level elements.
pub const ROOT: ElementId = ElementId::new(0);

/// Cap on bank-resolution hops, guarding against mapping cycles.
const MAX_INDIRECTION: usize = 64;

/// Arena of live elements plus the root-ownership list.
#[derive(Debug, Default)]
pub struct Circuit {
    elements: HashMap<ElementId, Box<dyn Element>>,
    roots: Vec<ElementId>,
    dirty: BTreeSet<ElementId>,
}

impl Circuit {
    /// Creates an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether an element with this id is live.
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Returns the number of live elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if no elements are live.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the ids of elements owned directly by the controller root.
    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    /// Returns a shared reference to an element.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownElement`] if the id is not live.
    pub fn get(&self, id: ElementId) -> Result<&dyn Element, KernelError> {
        self.elements
            .get(&id)
            .map(AsRef::as_ref)
            .ok_or(KernelError::UnknownElement { id })
    }

    /// Returns a mutable reference to an element.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownElement`] if the id is not live.
    pub fn get_mut(&mut self, id: ElementId) -> Result<&mut Box<dyn Element>, KernelError> {
        self.elements
            .get_mut(&id)
            .ok_or(KernelError::UnknownElement { id })
    }

    /// Inserts freshly instantiated elements, wiring each into its parent's
    /// child list (or the root list).
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::DuplicateElement`] if any id is already live;
    /// nothing is inserted in that case.
    pub fn insert(&mut self, elements: Vec<Box<dyn Element>>) -> Result<(), KernelError> {
        for element in &elements {
            if self.contains(element.id()) {
                return Err(KernelError::DuplicateElement { id: element.id() });
            }
        }
        for element in elements {
            let id = element.id();
            let parent = element.parent();
            let _ = self.elements.insert(id, element);
            if parent == ROOT {
                self.roots.push(id);
            } else if let Some(owner) = self.elements.get_mut(&parent) {
                owner.attach_child(id);
            }
        }
        Ok(())
    }

    /// Resolves an input endpoint through compound/bank indirection down to
    /// a concrete element and port.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnresolvedIndirection`] for an unmapped port
    /// or a mapping cycle, [`KernelError::UnknownElement`] for a dangling id.
    pub fn resolve_input(&self, mut endpoint: PortRef) -> Result<PortRef, KernelError> {
        for _ in 0..MAX_INDIRECTION {
            let element = self.get(endpoint.element)?;
            let via = if let Some(compound) = element.as_compound() {
                compound.input_bank()
            } else if element.as_bank().is_some() {
                endpoint.element
            } else {
                return Ok(endpoint);
            };
            endpoint = self.bank_lookup(via, endpoint)?;
        }
        Err(KernelError::UnresolvedIndirection {
            id: endpoint.element,
            port: endpoint.port,
        })
    }

    /// Resolves an output endpoint through compound/bank indirection down
    /// to the concrete driving element and port.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Circuit::resolve_input`].
    pub fn resolve_output(&self, mut endpoint: PortRef) -> Result<PortRef, KernelError> {
        for _ in 0..MAX_INDIRECTION {
            let element = self.get(endpoint.element)?;
            let via = if let Some(compound) = element.as_compound() {
                compound.output_bank()
            } else if element.as_bank().is_some() {
                endpoint.element
            } else {
                return Ok(endpoint);
            };
            endpoint = self.bank_lookup(via, endpoint)?;
        }
        Err(KernelError::UnresolvedIndirection {
            id: endpoint.element,
            port: endpoint.port,
        })
    }

    fn bank_lookup(&self, bank_id: ElementId, endpoint: PortRef) -> Result<PortRef, KernelError> {
        let bank = self
            .get(bank_id)?
            .as_bank()
            .ok_or(KernelError::UnresolvedIndirection {
                id: bank_id,
                port: endpoint.port,
            })?;
        bank.lookup(endpoint.port)
            .ok_or(KernelError::UnresolvedIndirection {
                id: endpoint.element,
                port: endpoint.port,
            })
    }

    /// Maps a compound's external input port to an inner endpoint.
    ///
    /// # Errors
    ///
    /// Fails when `compound` is not a compound element.
    pub fn map_compound_input(
        &mut self,
        compound: ElementId,
        port: PortIndex,
        target: PortRef,
    ) -> Result<(), KernelError> {
        let bank = self
            .get(compound)?
            .as_compound()
            .map(|c| c.input_bank())
            .ok_or(KernelError::MalformedCommand {
                reason: format!("{compound} is not a compound element"),
            })?;
        self.map_bank(bank, port, target)
    }

    /// Maps a compound's external output port to the inner driver endpoint.
    ///
    /// # Errors
    ///
    /// Fails when `compound` is not a compound element.
    pub fn map_compound_output(
        &mut self,
        compound: ElementId,
        port: PortIndex,
        target: PortRef,
    ) -> Result<(), KernelError> {
        let bank = self
            .get(compound)?
            .as_compound()
            .map(|c| c.output_bank())
            .ok_or(KernelError::MalformedCommand {
                reason: format!("{compound} is not a compound element"),
            })?;
        self.map_bank(bank, port, target)
    }

    fn map_bank(
        &mut self,
        bank_id: ElementId,
        port: PortIndex,
        target: PortRef,
    ) -> Result<(), KernelError> {
        let bank =
            self.get_mut(bank_id)?
                .as_bank_mut()
                .ok_or(KernelError::UnresolvedIndirection {
                    id: bank_id,
                    port,
                })?;
        bank.map(port, target);
        Ok(())
    }

    /// Connects a source output port to a sink input port with the given
    /// propagation delay, running the two-phase handshake.
    ///
    /// Returns re-synchronization events to schedule (an interconnect
    /// source re-emits its current state to the new endpoint at
    /// `now + delay`).
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ConnectionRejected`] when either endpoint
    /// refuses; no state is altered in that case.
    pub fn connect(
        &mut self,
        source: PortRef,
        sink: PortRef,
        delay: u64,
        now: SimTime,
    ) -> Result<Vec<Scheduled>, KernelError> {
        let src = self.resolve_output(source)?;
        let snk = self.resolve_input(sink)?;
        let rejected = KernelError::ConnectionRejected {
            source_id: src.element,
            source_port: src.port,
            sink_id: snk.element,
            sink_port: snk.port,
        };

        if !self.get(src.element)?.can_drive(src.port) {
            return Err(rejected);
        }
        if !self
            .get_mut(snk.element)?
            .connected(src.element, src.port, snk.port)
        {
            return Err(rejected);
        }
        let link = OutputLink {
            sink: snk.element,
            sink_port: snk.port,
            delay,
        };
        if !self.get_mut(src.element)?.connect(src.port, link) {
            // Roll the accepted sink side back before reporting.
            let _ = self.get_mut(snk.element)?.disconnected(snk.port);
            return Err(rejected);
        }

        let resync = self
            .get(src.element)?
            .as_interconnect()
            .map(|wire| vec![wire.reset_endpoint(&link, now)])
            .unwrap_or_default();
        Ok(resync)
    }

    /// Removes the connection recorded at a source output port and releases
    /// the peer's input port.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::NotConnected`] when nothing is connected
    /// there (idempotent no-op at the state level).
    pub fn disconnect(&mut self, source: PortRef) -> Result<(), KernelError> {
        let src = self.resolve_output(source)?;
        let link =
            self.get_mut(src.element)?
                .disconnect(src.port)
                .ok_or(KernelError::NotConnected {
                    source_id: src.element,
                    source_port: src.port,
                })?;
        // A missing sink was already destroyed; its ports died with it.
        if let Ok(sink) = self.get_mut(link.sink) {
            let _ = sink.disconnected(link.sink_port);
        }
        Ok(())
    }

    /// Applies one event during processing.
    ///
    /// `Edge` applies the input change and, on the last edge of the group,
    /// fires the element's tick. `OutEdge` commits the driver's cached
    /// output state and synthesizes the downstream edge. Events addressed
    /// to elements deleted since scheduling are dropped.
    ///
    /// Elements whose committed state changes here are recorded as dirty;
    /// [`Circuit::take_dirty`] drains them.
    pub fn deliver(&mut self, event: SimEvent, when: SimTime, is_last: bool) -> Vec<Scheduled> {
        match event {
            SimEvent::Edge {
                element,
                input,
                state,
            } => {
                let Ok(target) = self.get_mut(element) else {
                    warn!(%element, "dropping edge for deleted element");
                    return Vec::new();
                };
                target.edge(input, state);
                if !is_last {
                    return Vec::new();
                }
                let before = target.as_interconnect().map(Interconnect::state);
                let follow = target.clock(when);
                if target.as_interconnect().map(Interconnect::state) != before {
                    let _ = self.dirty.insert(element);
                }
                follow
            }
            SimEvent::OutEdge {
                element,
                output,
                state,
            } => {
                let Ok(driver) = self.get_mut(element) else {
                    warn!(%element, "dropping output commit for deleted element");
                    return Vec::new();
                };
                let mut changed = false;
                if let Some(simple) = driver.as_simple_mut() {
                    changed = simple.output_state(output) != Some(state);
                    simple.commit_output(output, state);
                }
                let follow = driver
                    .output_link(output)
                    .map(|link| {
                        vec![Scheduled::at(
                            when.after(link.delay),
                            SimEvent::Edge {
                                element: link.sink,
                                input: link.sink_port,
                                state,
                            },
                        )]
                    })
                    .unwrap_or_default();
                if changed {
                    let _ = self.dirty.insert(element);
                }
                follow
            }
        }
    }

    /// Drains the ids of elements whose committed state changed during
    /// event delivery since the last drain.
    pub fn take_dirty(&mut self) -> Vec<ElementId> {
        let drained = std::mem::take(&mut self.dirty);
        drained.into_iter().collect()
    }

    /// Destroys an element and all its descendants.
    ///
    /// Children are destroyed before parents, and every edge touching a
    /// destroyed element is torn down before the node is removed. Returns
    /// the destroyed ids, leaves first.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownElement`] if `id` is not live.
    pub fn destroy(&mut self, id: ElementId) -> Result<Vec<ElementId>, KernelError> {
        if !self.contains(id) {
            return Err(KernelError::UnknownElement { id });
        }
        let mut order = Vec::new();
        self.collect_subtree(id, &mut order);
        // Leaves first.
        order.reverse();

        for victim in &order {
            self.sever(*victim);
            let _ = self.dirty.remove(victim);
            let removed = self.elements.remove(victim);
            if let Some(element) = removed {
                let parent = element.parent();
                if parent == ROOT {
                    self.roots.retain(|r| r != victim);
                } else if let Some(owner) = self.elements.get_mut(&parent) {
                    owner.detach_child(*victim);
                }
            }
        }
        Ok(order)
    }

    fn collect_subtree(&self, id: ElementId, out: &mut Vec<ElementId>) {
        out.push(id);
        if let Ok(element) = self.get(id) {
            for child in element.children().to_vec() {
                self.collect_subtree(child, out);
            }
        }
    }

    /// Tears down every connection touching `id`.
    fn sever(&mut self, id: ElementId) {
        let (incoming, outgoing) = match self.get(id) {
            Ok(element) => {
                let incoming: Vec<_> = (0..element.input_count())
                    .filter_map(|port| element.input_link(PortIndex::new(port)))
                    .collect();
                let outgoing: Vec<_> = (0..element.output_count())
                    .filter_map(|port| {
                        element
                            .output_link(PortIndex::new(port))
                            .map(|link| (PortIndex::new(port), link))
                    })
                    .collect();
                (incoming, outgoing)
            }
            Err(_) => return,
        };

        for link in incoming {
            if let Ok(source) = self.get_mut(link.source) {
                let _ = source.disconnect(link.source_port);
            }
        }
        for (port, link) in outgoing {
            if let Ok(element) = self.get_mut(id) {
                let _ = element.disconnect(port);
            }
            if let Ok(sink) = self.get_mut(link.sink) {
                let _ = sink.disconnected(link.sink_port);
            }
        }
    }

    /// Re-derives the observable metadata of an element.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownElement`] if the id is not live.
    pub fn describe(&self, id: ElementId) -> Result<Metadata, KernelError> {
        Ok(self.get(id)?.describe())
    }

    /// Returns every recorded outgoing connection of an element.
    pub fn outgoing(&self, id: ElementId) -> Vec<(PortIndex, OutputLink)> {
        self.get(id).map_or_else(
            |_| Vec::new(),
            |element| {
                (0..element.output_count())
                    .filter_map(|port| {
                        element
                            .output_link(PortIndex::new(port))
                            .map(|link| (PortIndex::new(port), link))
                    })
                    .collect()
            },
        )
    }
}
