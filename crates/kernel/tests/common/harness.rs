use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};

use logicsim_core::circuit::ROOT;
use logicsim_core::common::{ElementId, Guid, PortIndex, SimTime};
use logicsim_core::element::PortRef;
use logicsim_core::event::{Scheduled, SimEvent};
use logicsim_core::{Circuit, ComponentLibrary, Core};

/// In-process harness: registry, circuit, and core wired together without
/// the controller/channel layer.
pub struct TestContext {
    pub library: ComponentLibrary,
    pub circuit: Circuit,
    pub core: Core,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            library: ComponentLibrary::with_builtins(),
            circuit: Circuit::new(),
            core: Core::new(),
        }
    }

    /// Instantiates a component at the controller root and returns the
    /// principal element's id.
    pub fn create(&mut self, guid: &str, metadata: Value) -> ElementId {
        self.create_child(guid, ROOT, metadata)
    }

    /// Instantiates a component under the given parent.
    pub fn create_child(&mut self, guid: &str, parent: ElementId, metadata: Value) -> ElementId {
        let metadata: Map<String, Value> = match metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => panic!("metadata must be a JSON object, got {other}"),
        };
        let elements = self
            .library
            .instantiate(&Guid::new(guid), None, parent, &metadata)
            .expect("instantiate");
        let principal = elements.first().expect("factory output").id();
        self.circuit.insert(elements).expect("insert");
        principal
    }

    /// Shorthand for an interconnect with default state.
    pub fn wire(&mut self) -> ElementId {
        self.create("wire.interconnect", json!({}))
    }

    /// Shorthand for a gate with the given input width and delay.
    pub fn gate(&mut self, guid: &str, inputs: u64, delay: u64) -> ElementId {
        self.create(guid, json!({ "inputs": inputs, "delay": delay }))
    }

    /// Connects two ports, scheduling any re-synchronization events.
    pub fn connect(&mut self, source: (ElementId, usize), sink: (ElementId, usize), delay: u64) {
        let resync = self
            .circuit
            .connect(
                PortRef::new(source.0, PortIndex::new(source.1)),
                PortRef::new(sink.0, PortIndex::new(sink.1)),
                delay,
                self.core.clock(),
            )
            .expect("connect");
        for event in resync {
            self.core.schedule(event);
        }
    }

    /// Schedules an input edge at an absolute simulated time.
    pub fn edge_at(&mut self, id: ElementId, input: usize, state: bool, at: u64) {
        let target = self
            .circuit
            .resolve_input(PortRef::new(id, PortIndex::new(input)))
            .expect("resolve input");
        self.core.schedule(Scheduled::at(
            SimTime::new(at),
            SimEvent::Edge {
                element: target.element,
                input: target.port,
                state,
            },
        ));
    }

    /// Processes every event up to and including simulated time `target`.
    pub fn run_to(&mut self, target: u64) {
        self.core.process_until(
            &mut self.circuit,
            SimTime::new(target),
            Instant::now() + Duration::from_secs(5),
        );
    }

    /// Re-derived observable metadata of an element.
    pub fn describe(&self, id: ElementId) -> Map<String, Value> {
        self.circuit.describe(id).expect("describe")
    }

    /// Cached state at a gate output port.
    pub fn output_state(&self, id: ElementId, port: usize) -> bool {
        self.describe(id)["output-states"][port]
            .as_bool()
            .expect("output-states entry")
    }

    /// Current state of an interconnect.
    pub fn wire_state(&self, id: ElementId) -> bool {
        self.describe(id)["state"].as_bool().expect("state")
    }
}
