//! Event scheduler ordering and clock invariants.
//!
//! Verifies deterministic queue ordering, same-timestamp edge grouping,
//! idle clock advance, and the monotonicity panics.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::common::harness::TestContext;

#[test]
fn idle_clock_advances_to_target() {
    let mut ctx = TestContext::new();
    assert_eq!(ctx.core.clock().val(), 0);
    ctx.run_to(100);
    assert_eq!(ctx.core.clock().val(), 100);
}

#[test]
fn clock_stops_at_target_with_pending_events() {
    let mut ctx = TestContext::new();
    let wire = ctx.wire();
    ctx.edge_at(wire, 0, true, 500);
    ctx.run_to(100);
    assert_eq!(ctx.core.clock().val(), 100);
    // The pending edge is untouched.
    assert!(!ctx.wire_state(wire));
    ctx.run_to(500);
    assert!(ctx.wire_state(wire));
}

#[test]
#[should_panic(expected = "scheduled into the past")]
fn scheduling_into_the_past_panics() {
    let mut ctx = TestContext::new();
    let wire = ctx.wire();
    ctx.run_to(50);
    ctx.edge_at(wire, 0, true, 10);
}

#[test]
fn same_timestamp_edges_tick_the_element_once() {
    let mut ctx = TestContext::new();
    let gate = ctx.gate("gate.and", 3, 1);
    // Three edges land on the gate in the same timestamp group; the tick
    // fires once, after all of them. A second tick at the same timestamp
    // would panic inside the gate.
    ctx.edge_at(gate, 0, true, 10);
    ctx.edge_at(gate, 1, true, 10);
    ctx.edge_at(gate, 2, true, 10);
    ctx.run_to(11);
    assert!(ctx.output_state(gate, 0));
    // Three input edges plus one output commit.
    assert_eq!(ctx.core.stats().retired_events, 4);
}

#[test]
fn partial_group_does_not_glitch_the_output() {
    let mut ctx = TestContext::new();
    let gate = ctx.gate("gate.xor", 2, 1);
    // Both inputs rise in the same group: XOR stays low, no output event.
    ctx.edge_at(gate, 0, true, 10);
    ctx.edge_at(gate, 1, true, 10);
    ctx.run_to(20);
    assert!(!ctx.output_state(gate, 0));
    assert_eq!(ctx.core.stats().retired_events, 2);
}

#[test]
fn edges_to_different_elements_at_one_timestamp_each_tick() {
    let mut ctx = TestContext::new();
    let not_a = ctx.gate("gate.not", 1, 1);
    let not_b = ctx.gate("gate.not", 1, 1);
    ctx.edge_at(not_a, 0, true, 5);
    ctx.edge_at(not_b, 0, true, 5);
    ctx.run_to(6);
    assert!(!ctx.output_state(not_a, 0));
    assert!(!ctx.output_state(not_b, 0));
}

proptest! {
    /// After every scheduled edge has settled, a gate's output equals its
    /// logic applied to the last edge seen per input. Edges are spaced at
    /// least one propagation delay apart so each flip lands before the
    /// next tick evaluates.
    #[test]
    fn gate_output_settles_to_final_inputs(
        entries in prop::collection::vec((0usize..2, any::<bool>()), 1..40),
        delay in 1u64..=10,
    ) {
        let mut ctx = TestContext::new();
        let gate = ctx.gate("gate.and", 2, delay);

        let mut last = [false; 2];
        for (step, (input, state)) in entries.iter().enumerate() {
            ctx.edge_at(gate, *input, *state, (step as u64 + 1) * 10);
            last[*input] = *state;
        }
        let horizon = entries.len() as u64 * 10 + delay;
        ctx.run_to(horizon);

        prop_assert_eq!(ctx.output_state(gate, 0), last[0] && last[1]);
        prop_assert_eq!(ctx.core.clock().val(), horizon);
    }

    /// The clock never moves backwards across a run, whatever the event mix.
    #[test]
    fn clock_is_monotonic(targets in prop::collection::vec(0u64..500, 1..20)) {
        let mut ctx = TestContext::new();
        let wire = ctx.wire();
        ctx.edge_at(wire, 0, true, 3);

        let mut stops: BTreeSet<u64> = targets.into_iter().collect();
        let _ = stops.insert(500);
        let mut previous = 0;
        for target in &stops {
            ctx.run_to(*target);
            prop_assert!(ctx.core.clock().val() >= previous);
            previous = ctx.core.clock().val();
        }
    }
}
