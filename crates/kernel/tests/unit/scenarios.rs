//! Timing scenarios over small reference circuits.

use pretty_assertions::assert_eq;
use serde_json::json;

use logicsim_core::common::{ElementId, PortIndex};
use logicsim_core::element::PortRef;

use crate::common::harness::TestContext;

/// Half adder: two input wires fan out to an XOR (sum) and an AND (carry).
///
/// Wire-to-gate connections carry delay 2, the gates delay 2, and the
/// gate-to-output-wire connections delay 0.
struct HalfAdder {
    a: ElementId,
    b: ElementId,
    sum: ElementId,
    carry: ElementId,
}

fn half_adder(ctx: &mut TestContext) -> HalfAdder {
    let a = ctx.wire();
    let b = ctx.wire();
    let xor = ctx.gate("gate.xor", 2, 2);
    let and = ctx.gate("gate.and", 2, 2);
    let sum = ctx.wire();
    let carry = ctx.wire();

    ctx.connect((a, 0), (xor, 0), 2);
    ctx.connect((a, 1), (and, 0), 2);
    ctx.connect((b, 0), (xor, 1), 2);
    ctx.connect((b, 1), (and, 1), 2);
    ctx.connect((xor, 0), (sum, 0), 0);
    ctx.connect((and, 0), (carry, 0), 0);

    HalfAdder { a, b, sum, carry }
}

#[test]
fn half_adder_settles_through_both_transitions() {
    let mut ctx = TestContext::new();
    let adder = half_adder(&mut ctx);

    // A rises at 10: the edge reaches the gates at 12, the XOR flips at
    // 14, and the sum wire commits in the same timestamp group.
    ctx.edge_at(adder.a, 0, true, 10);
    ctx.run_to(14);
    assert!(ctx.wire_state(adder.sum));
    assert!(!ctx.wire_state(adder.carry));

    // B rises at 15: gate inputs settle at 17, both gates flip at 19.
    ctx.edge_at(adder.b, 0, true, 15);
    ctx.run_to(18);
    assert!(ctx.wire_state(adder.sum));
    assert!(!ctx.wire_state(adder.carry));

    ctx.run_to(19);
    assert!(!ctx.wire_state(adder.sum));
    assert!(ctx.wire_state(adder.carry));
}

#[test]
fn half_adder_is_quiescent_after_settling() {
    let mut ctx = TestContext::new();
    let adder = half_adder(&mut ctx);
    ctx.edge_at(adder.a, 0, true, 10);
    ctx.edge_at(adder.b, 0, true, 10);
    ctx.run_to(100);

    let settled = ctx.core.stats().retired_events;
    ctx.run_to(1_000);
    assert_eq!(ctx.core.stats().retired_events, settled);
    assert!(!ctx.wire_state(adder.sum));
    assert!(ctx.wire_state(adder.carry));
}

/// Builds a compound wrapping a single 2-input gate, with its external
/// ports mapped straight onto the gate's ports.
fn wrapped_gate(ctx: &mut TestContext, logic: &str, delay: u64) -> ElementId {
    let shell = ctx.create("compound.element", json!({}));
    let inner = ctx.create_child(logic, shell, json!({ "inputs": 2, "delay": delay }));
    ctx.circuit
        .map_compound_input(
            shell,
            PortIndex::new(0),
            PortRef::new(inner, PortIndex::new(0)),
        )
        .expect("map input 0");
    ctx.circuit
        .map_compound_input(
            shell,
            PortIndex::new(1),
            PortRef::new(inner, PortIndex::new(1)),
        )
        .expect("map input 1");
    ctx.circuit
        .map_compound_output(
            shell,
            PortIndex::new(0),
            PortRef::new(inner, PortIndex::new(0)),
        )
        .expect("map output 0");
    shell
}

#[test]
fn compound_indirection_adds_no_delay() {
    let mut ctx = TestContext::new();
    let wrapped = wrapped_gate(&mut ctx, "gate.and", 2);
    let a = ctx.wire();
    let b = ctx.wire();
    let out = ctx.wire();

    ctx.connect((a, 0), (wrapped, 0), 1);
    ctx.connect((b, 0), (wrapped, 1), 1);
    ctx.connect((wrapped, 0), (out, 0), 1);

    // Same schedule as wiring the gate directly: edges at 11, gate flips
    // at 13, the output wire commits at 14.
    ctx.edge_at(a, 0, true, 10);
    ctx.edge_at(b, 0, true, 10);
    ctx.run_to(13);
    assert!(!ctx.wire_state(out));
    ctx.run_to(14);
    assert!(ctx.wire_state(out));
}

#[test]
fn nested_compounds_resolve_through_both_banks() {
    let mut ctx = TestContext::new();
    let inner_shell = wrapped_gate(&mut ctx, "gate.or", 1);
    let outer_shell = ctx.create("compound.element", json!({}));

    ctx.circuit
        .map_compound_input(
            outer_shell,
            PortIndex::new(0),
            PortRef::new(inner_shell, PortIndex::new(0)),
        )
        .expect("map outer input");
    ctx.circuit
        .map_compound_output(
            outer_shell,
            PortIndex::new(0),
            PortRef::new(inner_shell, PortIndex::new(0)),
        )
        .expect("map outer output");

    let input = ctx.wire();
    let output = ctx.wire();
    ctx.connect((input, 0), (outer_shell, 0), 1);
    ctx.connect((outer_shell, 0), (output, 0), 1);

    ctx.edge_at(input, 0, true, 10);
    ctx.run_to(13);
    assert!(ctx.wire_state(output));
}

#[test]
fn unmapped_compound_port_is_rejected_at_connect_time() {
    let mut ctx = TestContext::new();
    let shell = ctx.create("compound.element", json!({}));
    let wire = ctx.wire();

    let err = ctx
        .circuit
        .connect(
            PortRef::new(wire, PortIndex::new(0)),
            PortRef::new(shell, PortIndex::new(7)),
            0,
            ctx.core.clock(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        logicsim_core::common::KernelError::UnresolvedIndirection { .. }
    ));
}
