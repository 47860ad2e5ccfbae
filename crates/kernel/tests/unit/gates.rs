//! Parameterized truth-table checks for the builtin gate types.

use rstest::rstest;
use serde_json::json;

use crate::common::harness::TestContext;

#[rstest]
#[case("gate.and", [false, false], false)]
#[case("gate.and", [true, false], false)]
#[case("gate.and", [true, true], true)]
#[case("gate.or", [false, false], false)]
#[case("gate.or", [true, false], true)]
#[case("gate.xor", [true, false], true)]
#[case("gate.xor", [true, true], false)]
#[case("gate.nand", [true, true], false)]
#[case("gate.nand", [true, false], true)]
#[case("gate.nor", [false, false], true)]
#[case("gate.nor", [true, false], false)]
fn two_input_gate_truth_tables(
    #[case] guid: &str,
    #[case] inputs: [bool; 2],
    #[case] expected: bool,
) {
    let mut ctx = TestContext::new();
    let gate = ctx.gate(guid, 2, 1);
    ctx.edge_at(gate, 0, inputs[0], 10);
    ctx.edge_at(gate, 1, inputs[1], 10);
    ctx.run_to(11);
    assert_eq!(ctx.output_state(gate, 0), expected, "{guid} {inputs:?}");
}

#[rstest]
#[case(false, true)]
#[case(true, false)]
fn inverter_truth_table(#[case] input: bool, #[case] expected: bool) {
    let mut ctx = TestContext::new();
    let gate = ctx.gate("gate.not", 1, 1);
    ctx.edge_at(gate, 0, input, 10);
    ctx.run_to(11);
    assert_eq!(ctx.output_state(gate, 0), expected);
}

#[rstest]
#[case(2)]
#[case(4)]
#[case(8)]
fn wide_and_needs_every_input(#[case] width: u64) {
    let mut ctx = TestContext::new();
    let gate = ctx.create("gate.and", json!({ "inputs": width, "delay": 1 }));
    for input in 0..width - 1 {
        ctx.edge_at(gate, input as usize, true, 10);
    }
    ctx.run_to(20);
    assert!(!ctx.output_state(gate, 0));

    ctx.edge_at(gate, width as usize - 1, true, 30);
    ctx.run_to(31);
    assert!(ctx.output_state(gate, 0));
}
