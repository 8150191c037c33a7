// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Integration tests for the commit protocol under the Immediate runner:
//! propagation, minimal recomputation, and the equality short circuit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use flowlib::{CoreHandle, FlowCore};

#[test]
fn test_basic_propagation() {
    let core = FlowCore::new();
    let a = core.port_with(0_i32);
    let b = core.node(|x: &i32| *x + 1, (&a,));
    let (b_out,) = b.outputs();
    let c = core.node(|x: &i32| *x + 1, (&b_out,));
    let (c_out,) = c.outputs();

    core.commit();
    assert_eq!(b_out.value(), 1);
    assert_eq!(c_out.value(), 2);

    a.set_value(10);
    core.commit();
    assert_eq!(b_out.value(), 11);
    assert_eq!(c_out.value(), 12);
}

#[test]
fn test_equality_short_circuit_runs_nothing() {
    let core = FlowCore::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let a = core.port_with(0_i32);
    let counter = Arc::clone(&runs);
    let b = core.node(
        move |x: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            *x + 1
        },
        (&a,),
    );
    let (b_out,) = b.outputs();

    a.set_value(10);
    core.commit();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_out.value(), 11);

    // Same value again: no node executes because of that diff.
    a.set_value(10);
    core.commit();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_out.value(), 11);
}

#[test]
fn test_commit_without_diffs_is_idempotent() {
    let core = FlowCore::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let a = core.port_with(1_i32);
    let counter = Arc::clone(&runs);
    core.node(
        move |x: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            *x
        },
        (&a,),
    );

    core.commit();
    core.commit();
    core.commit();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_duplicate_set_before_commit_executes_once() {
    let core = FlowCore::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let a = core.port_with(0_i32);
    let counter = Arc::clone(&runs);
    let b = core.node(
        move |x: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            *x + 1
        },
        (&a,),
    );
    let (b_out,) = b.outputs();

    core.commit();
    a.set_value(5);
    a.set_value(5);
    core.commit();
    assert_eq!(b_out.value(), 6);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_set_then_unset_collapses_to_unset() {
    let core = FlowCore::new();
    let a = core.port_with(1_i32);

    a.set_value(2);
    a.unset_value();
    core.commit();
    assert!(!a.has_value());
}

#[test]
fn test_zero_input_node_executes_once_per_registration() {
    let core = FlowCore::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    let n = core.node(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            42_i32
        },
        (),
    );
    let (out,) = n.outputs();

    core.commit();
    assert_eq!(out.value(), 42);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    core.commit();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unset_leaves_chain_not_ready() {
    let core = FlowCore::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let a = core.port_with(1_i32);
    let counter = Arc::clone(&runs);
    let b = core.node(
        move |x: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            *x + 1
        },
        (&a,),
    );
    let (b_out,) = b.outputs();
    let c = core.node(|x: &i32| *x + 1, (&b_out,));
    let (c_out,) = c.outputs();

    core.commit();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    a.unset_value();
    core.commit();
    // Downstream pended but never run; prior outputs stay in place but are
    // no longer ready.
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(!b_out.is_ready());
    assert!(!c_out.is_ready());

    a.set_value(3);
    core.commit();
    assert_eq!(b_out.value(), 4);
    assert_eq!(c_out.value(), 5);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_determinism_under_immediate() {
    fn run_once() -> (Vec<&'static str>, i32) {
        let core = FlowCore::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = core.port_with(0_i32);
        let l = Arc::clone(&log);
        let b = core.node(
            move |x: &i32| {
                l.lock().push("b");
                *x + 1
            },
            (&a,),
        );
        let (b_out,) = b.outputs();
        let l = Arc::clone(&log);
        let c = core.node(
            move |x: &i32| {
                l.lock().push("c");
                *x + 1
            },
            (&b_out,),
        );
        let (c_out,) = c.outputs();

        core.commit();
        a.set_value(10);
        core.commit();
        a.set_value(3);
        a.set_value(4);
        core.commit();

        let order = log.lock().clone();
        (order, c_out.value())
    }

    let first = run_once();
    let second = run_once();
    assert_eq!(first, second);
    assert_eq!(first.1, 6);
}

#[test]
fn test_post_and_apply_build_graph() {
    let core = FlowCore::new();
    let out = Arc::new(Mutex::new(None));

    let sink = Arc::clone(&out);
    core.apply(move |graph| {
        let a = graph.port_with(20_i32);
        let n = graph.node(|x: &i32| *x * 2, (&a,));
        let (n_out,) = n.outputs();
        *sink.lock() = Some(n_out);
    });

    let n_out = out.lock().take().expect("node registered");
    assert_eq!(n_out.value(), 40);
}

#[test]
fn test_core_handle_posts_are_deferred_one_cycle() {
    let core = FlowCore::new();
    let a = core.port_with(1_i32);
    let created = Arc::new(Mutex::new(None));

    let sink = Arc::clone(&created);
    core.node(
        move |handle: &CoreHandle, x: &i32| {
            let sink = Arc::clone(&sink);
            let seed = *x;
            handle.post(move |graph| {
                *sink.lock() = Some(graph.port_with(seed * 100));
            });
        },
        (&a,),
    );

    core.commit();
    // The post from the node body has not been drained yet.
    assert!(created.lock().is_none());

    core.commit();
    let port = created.lock().take().expect("deferred port created");
    assert_eq!(port.value(), 100);
}
