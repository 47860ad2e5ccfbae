//! Connection handshake, delivery, and teardown behavior.

use pretty_assertions::assert_eq;
use serde_json::json;

use logicsim_core::common::{KernelError, PortIndex};
use logicsim_core::element::PortRef;

use crate::common::harness::TestContext;

#[test]
fn fan_out_delivers_with_per_endpoint_delays() {
    let mut ctx = TestContext::new();
    let source = ctx.wire();
    let near = ctx.wire();
    let far = ctx.wire();
    ctx.connect((source, 0), (near, 0), 2);
    ctx.connect((source, 1), (far, 0), 5);

    ctx.edge_at(source, 0, true, 10);
    ctx.run_to(12);
    assert!(ctx.wire_state(near));
    assert!(!ctx.wire_state(far));
    ctx.run_to(15);
    assert!(ctx.wire_state(far));
}

#[test]
fn unchanged_state_produces_no_downstream_traffic() {
    let mut ctx = TestContext::new();
    let source = ctx.wire();
    let sink = ctx.wire();
    ctx.connect((source, 0), (sink, 0), 1);

    // The wire is already low; a low edge commits nothing. Only the
    // connect-time resync edge and the injected edge retire.
    ctx.edge_at(source, 0, false, 10);
    ctx.run_to(20);
    assert_eq!(ctx.core.stats().retired_events, 2);
    assert!(!ctx.wire_state(sink));
}

#[test]
fn connecting_a_live_wire_resynchronizes_the_new_endpoint() {
    let mut ctx = TestContext::new();
    let source = ctx.wire();
    ctx.edge_at(source, 0, true, 5);
    ctx.run_to(6);
    assert!(ctx.wire_state(source));

    // The sink joins after the wire went high; it still converges.
    let sink = ctx.wire();
    ctx.connect((source, 0), (sink, 0), 3);
    assert!(!ctx.wire_state(sink));
    ctx.run_to(9);
    assert!(ctx.wire_state(sink));
}

#[test]
fn restored_wire_state_comes_from_metadata() {
    let mut ctx = TestContext::new();
    let high = ctx.create("wire.interconnect", json!({ "state": true }));
    assert!(ctx.wire_state(high));
}

#[test]
fn occupied_input_port_rejects_a_second_driver() {
    let mut ctx = TestContext::new();
    let first = ctx.wire();
    let second = ctx.wire();
    let gate = ctx.gate("gate.and", 2, 1);
    ctx.connect((first, 0), (gate, 0), 1);

    let err = ctx
        .circuit
        .connect(
            PortRef::new(second, PortIndex::new(0)),
            PortRef::new(gate, PortIndex::new(0)),
            1,
            ctx.core.clock(),
        )
        .unwrap_err();
    assert!(matches!(err, KernelError::ConnectionRejected { .. }));
    assert_eq!(
        err.to_string(),
        format!("connection rejected: {second}:0 -> {gate}:0")
    );
    // The rejected source recorded nothing.
    assert!(ctx.circuit.outgoing(second).is_empty());
}

#[test]
fn occupied_output_port_rejects_a_second_sink() {
    let mut ctx = TestContext::new();
    let gate = ctx.gate("gate.or", 2, 1);
    let first = ctx.wire();
    let second = ctx.wire();
    ctx.connect((gate, 0), (first, 0), 0);

    let err = ctx
        .circuit
        .connect(
            PortRef::new(gate, PortIndex::new(0)),
            PortRef::new(second, PortIndex::new(0)),
            0,
            ctx.core.clock(),
        )
        .unwrap_err();
    assert!(matches!(err, KernelError::ConnectionRejected { .. }));
    // The rollback released the second wire's input.
    ctx.connect((first, 0), (second, 0), 1);
}

#[test]
fn disconnect_releases_the_sink_for_reconnection() {
    let mut ctx = TestContext::new();
    let first = ctx.wire();
    let second = ctx.wire();
    let gate = ctx.gate("gate.and", 2, 1);
    ctx.connect((first, 0), (gate, 0), 1);

    ctx.circuit
        .disconnect(PortRef::new(first, PortIndex::new(0)))
        .expect("disconnect");
    ctx.connect((second, 0), (gate, 0), 1);

    let err = ctx
        .circuit
        .disconnect(PortRef::new(first, PortIndex::new(0)))
        .unwrap_err();
    assert!(matches!(err, KernelError::NotConnected { .. }));
}

#[test]
fn destroy_severs_edges_in_both_directions() {
    let mut ctx = TestContext::new();
    let upstream = ctx.wire();
    let gate = ctx.gate("gate.and", 2, 1);
    let downstream = ctx.wire();
    ctx.connect((upstream, 0), (gate, 0), 1);
    ctx.connect((gate, 0), (downstream, 0), 1);

    let removed = ctx.circuit.destroy(gate).expect("destroy");
    assert_eq!(removed, vec![gate]);
    assert!(!ctx.circuit.contains(gate));
    assert!(ctx.circuit.outgoing(upstream).is_empty());

    // Both severed peers accept new connections.
    ctx.connect((upstream, 0), (downstream, 0), 1);
}

#[test]
fn destroy_removes_descendants_leaves_first() {
    let mut ctx = TestContext::new();
    let shell = ctx.create("compound.element", json!({}));
    let inner = ctx.create_child("gate.and", shell, json!({ "inputs": 2, "delay": 1 }));

    let removed = ctx.circuit.destroy(shell).expect("destroy");
    // The shell comes last; its banks and the inner gate precede it.
    assert_eq!(removed.last(), Some(&shell));
    assert!(removed.contains(&inner));
    assert_eq!(removed.len(), 4);
    assert!(ctx.circuit.is_empty());
}

#[test]
fn events_for_destroyed_elements_are_dropped() {
    let mut ctx = TestContext::new();
    let gate = ctx.gate("gate.and", 2, 1);
    ctx.edge_at(gate, 0, true, 20);
    let _ = ctx.circuit.destroy(gate).expect("destroy");
    // The stale event retires without touching anything.
    ctx.run_to(30);
    assert_eq!(ctx.core.stats().retired_events, 1);
    assert_eq!(ctx.core.clock().val(), 30);
}

#[test]
fn wire_outputs_grow_on_demand() {
    let mut ctx = TestContext::new();
    let source = ctx.wire();
    let sink = ctx.wire();
    ctx.connect((source, 5), (sink, 0), 1);

    let outgoing = ctx.circuit.outgoing(source);
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].0, PortIndex::new(5));
}

#[test]
fn unknown_endpoints_are_reported() {
    let mut ctx = TestContext::new();
    let wire = ctx.wire();
    let err = ctx
        .circuit
        .connect(
            PortRef::new(wire, PortIndex::new(0)),
            PortRef::new(logicsim_core::common::ElementId::new(999), PortIndex::new(0)),
            0,
            ctx.core.clock(),
        )
        .unwrap_err();
    assert!(matches!(err, KernelError::UnknownElement { .. }));
}
