// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Integration tests for optional outputs: writes from node bodies ride
//! the diff queue and surface no earlier than the next cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flowlib::{CoreHandle, FlowCore, Port};

#[test]
fn test_optional_output_observed_next_cycle() {
    let core = FlowCore::new();
    let a = core.port_with(0_i32);

    let f = core.node(
        |opt: (Port<i32>,), a: &i32| {
            if *a % 2 == 0 {
                opt.0.set_value(*a + 100);
            }
        },
        (&a,),
    );
    let ((), (z,)) = f.outputs();

    let down_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&down_runs);
    let down = core.node(
        move |v: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            *v
        },
        (&z,),
    );
    let (down_out,) = down.outputs();

    // Cycle 1: f runs and enqueues the write; z is still unset.
    core.commit();
    assert!(!z.has_value());
    assert_eq!(down_runs.load(Ordering::SeqCst), 0);

    // Cycle 2: the deferred write is drained; downstream runs exactly now.
    core.commit();
    assert_eq!(z.value(), 100);
    assert_eq!(down_out.value(), 100);
    assert_eq!(down_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_optional_output_skipped_when_condition_false() {
    let core = FlowCore::new();
    let a = core.port_with(1_i32);

    let f = core.node(
        |opt: (Port<i32>,), a: &i32| {
            if *a % 2 == 0 {
                opt.0.set_value(*a + 100);
            }
        },
        (&a,),
    );
    let ((), (z,)) = f.outputs();

    core.commit();
    core.commit();
    assert!(!z.has_value());
}

#[test]
fn test_optional_output_writable_externally() {
    let core = FlowCore::new();

    let f = core.node(|_opt: (Port<i32>,)| {}, ());
    let ((), (z,)) = f.outputs();

    core.commit();
    z.set_value(3000);
    core.commit();
    assert_eq!(z.value(), 3000);
}

#[test]
fn test_core_and_optional_outputs_with_batch() {
    let core = FlowCore::new();
    let a = core.port_with(5_i32);

    let f = core.node(
        |handle: &CoreHandle, opt: (Port<i32>,), x: &i32| {
            let mut batch = handle.batch();
            batch.set_value(&opt.0, *x + 20);
        },
        (&a,),
    );
    let ((), (z,)) = f.outputs();

    core.commit();
    assert!(!z.has_value());
    core.commit();
    assert_eq!(z.value(), 25);
}

#[test]
fn test_two_optional_outputs() {
    let core = FlowCore::new();
    let a = core.port_with(3_i32);

    let f = core.node(
        |opt: (Port<i32>, Port<i32>), x: &i32| {
            opt.0.set_value(*x);
            opt.1.set_value(*x * 10);
        },
        (&a,),
    );
    let ((), (z0, z1)) = f.outputs();

    core.commit();
    core.commit();
    assert_eq!(z0.value(), 3);
    assert_eq!(z1.value(), 30);
}
