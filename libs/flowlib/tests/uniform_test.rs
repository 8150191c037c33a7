// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Integration tests for the uniform (type-erased) node API.

use flowlib::{FlowCore, FlowError, UniformArgs, UniformInput, UniformNode};

#[test]
fn test_uniform_sum_node() {
    let core = FlowCore::new();
    let a = core.port_with(2_i32);
    let b = core.port_with(3_i32);

    let outputs = core
        .unode(UniformNode {
            inputs: vec![UniformInput::new(&a), UniformInput::new(&b)],
            required: 1,
            optional: 0,
            body: Box::new(|args: UniformArgs<i32>| vec![args.inputs.iter().sum::<i32>()]),
        })
        .expect("failed to register uniform node");

    core.commit();
    assert_eq!(outputs[0].value(), 5);

    a.set_value(10);
    core.commit();
    assert_eq!(outputs[0].value(), 13);
}

#[test]
fn test_uniform_optional_outputs_deferred() {
    let core = FlowCore::new();
    let a = core.port_with(7_i32);

    let outputs = core
        .unode(UniformNode {
            inputs: vec![UniformInput::new(&a)],
            required: 0,
            optional: 1,
            body: Box::new(|args: UniformArgs<i32>| {
                args.optional[0].set_value(args.inputs[0] * 2);
                Vec::new()
            }),
        })
        .expect("failed to register uniform node");

    core.commit();
    assert!(!outputs[0].has_value());

    core.commit();
    assert_eq!(outputs[0].value(), 14);
}

#[test]
fn test_uniform_multiple_required_outputs() {
    let core = FlowCore::new();
    let a = core.port_with(4_i32);

    let outputs = core
        .unode(UniformNode {
            inputs: vec![UniformInput::new(&a)],
            required: 2,
            optional: 0,
            body: Box::new(|args: UniformArgs<i32>| {
                vec![args.inputs[0] + 1, args.inputs[0] - 1]
            }),
        })
        .expect("failed to register uniform node");

    core.commit();
    assert_eq!(outputs[0].value(), 5);
    assert_eq!(outputs[1].value(), 3);
}

#[test]
fn test_uniform_shape_mismatch_is_cycle_fatal() {
    let core = FlowCore::new();
    let a = core.port_with(1_i32);

    let outputs = core
        .unode(UniformNode {
            inputs: vec![UniformInput::new(&a)],
            required: 1,
            optional: 0,
            // Returns the declared count only when the input is even.
            body: Box::new(|args: UniformArgs<i32>| {
                if args.inputs[0] % 2 == 0 {
                    vec![args.inputs[0]]
                } else {
                    Vec::new()
                }
            }),
        })
        .expect("failed to register uniform node");

    core.commit();
    // Odd input: wrong count, cycle torn down, output untouched.
    assert!(!outputs[0].has_value());

    // The node is marked done and the engine stays usable.
    a.set_value(6);
    core.commit();
    assert_eq!(outputs[0].value(), 6);
}

#[test]
fn test_uniform_dead_input_is_a_registration_error() {
    let core = FlowCore::new();
    let a = core.port_with(1_i32);

    core.remove_port(&a);
    core.commit();

    let err = core
        .unode(UniformNode {
            inputs: vec![UniformInput::new(&a)],
            required: 1,
            optional: 0,
            body: Box::new(|args: UniformArgs<i32>| vec![args.inputs[0]]),
        })
        .expect_err("registration must fail");

    match err {
        FlowError::DeadInputPort { index } => assert_eq!(index, 0),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_uniform_core_handle_can_post() {
    let core = FlowCore::new();
    let a = core.port_with(1_i32);
    let b = core.port_with(0_i32);

    let b_clone = b.clone();
    let outputs = core
        .unode(UniformNode {
            inputs: vec![UniformInput::new(&a)],
            required: 1,
            optional: 0,
            body: Box::new(move |args: UniformArgs<i32>| {
                let value = args.inputs[0] * 10;
                let sink = b_clone.clone();
                args.core.post(move |_| sink.set_value(value));
                vec![value]
            }),
        })
        .expect("failed to register uniform node");

    core.commit();
    assert_eq!(outputs[0].value(), 10);

    // The post and the set it schedules are each one cycle out.
    core.commit();
    core.commit();
    assert_eq!(b.value(), 10);
}
